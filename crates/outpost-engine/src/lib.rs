//! The two scheduled drivers: the posting daemon's [`OpportunityPipeline`]
//! and the engagement [`ReconciliationPoller`].

pub mod aggregate;
pub mod daemon;
pub mod driver;
pub mod poller;
pub mod settings;

use outpost_state::StateError;
use thiserror::Error;

pub use aggregate::compute_aggregates;
pub use daemon::{DaemonRunSummary, OpportunityPipeline};
pub use driver::{build_pipeline, build_poller, run_daemon, run_poller};
pub use poller::{plan_polls, PollerRunSummary, ReconciliationPoller};
pub use settings::{DaemonSettings, PollerSettings};

/// Failures that stop a driver before it can finish its run.
///
/// Everything else is degraded per stage and reported in the run summary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state error: {0}")]
    State(#[from] StateError),
}
