//! The external tabular ledger: a view-oriented record-store abstraction,
//! its Google Sheets and in-memory backends, and the typed [`Ledger`]
//! adapter the drivers read and write through.

pub mod columns;
pub mod ledger;
pub mod memory;
pub mod sheets;
pub mod store;

use thiserror::Error;

pub use ledger::{
    plan_upsert, Ledger, LedgerViews, PerformanceView, UpsertPlan, UpsertReport, ViewRows,
};
pub use memory::MemoryRecordStore;
pub use sheets::SheetsRecordStore;
pub use store::{RecordStore, Row, RowUpdate};

#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store rejected the credentials.
    #[error("record store rejected credentials: {0}")]
    Unauthorized(String),

    /// Non-success response other than an auth failure.
    #[error("record store returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("view '{view}' has no row {row}")]
    RowOutOfRange { view: String, row: usize },

    /// Injected or internal failure from the in-memory store.
    #[error("record store failure: {0}")]
    Internal(String),
}

impl RecordStoreError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RecordStoreError::Unauthorized(_))
    }
}
