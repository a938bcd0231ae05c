use outpost_ledger::RecordStoreError;
use thiserror::Error;

/// Errors returned by collaborator clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service answered but refused or could not complete the request.
    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("ledger error: {0}")]
    Ledger(#[from] RecordStoreError),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}
