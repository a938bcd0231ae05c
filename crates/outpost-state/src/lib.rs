//! Persisted per-driver state, the publish rate limiter, and the
//! single-instance lock.

pub mod daemon;
pub mod lock;
pub mod poller;
pub mod rate_limit;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use daemon::{DailyTotal, DaemonState, EVENT_RETENTION_HOURS, REPLIED_DISCUSSIONS_KEPT};
pub use lock::InstanceLock;
pub use poller::PollerState;
pub use rate_limit::{RateDecision, RateLimiter};
pub use store::{JsonFileStore, MemoryStore, StateStore};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{path} is held by {owner}")]
    Locked { path: PathBuf, owner: String },

    #[error("in-memory state lock poisoned: {0}")]
    Poisoned(String),
}

impl StateError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StateError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
