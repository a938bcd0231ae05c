//! Entry points used by the binary: build a driver from configuration, take
//! its instance lock and run it against file-backed state.

use std::sync::Arc;

use outpost_clients::{Collaborators, MetricsSource};
use outpost_core::{AppConfig, Clock, TopicRotation};
use outpost_ledger::Ledger;
use outpost_state::{DaemonState, InstanceLock, JsonFileStore, PollerState, RateLimiter};

use crate::daemon::{DaemonRunSummary, OpportunityPipeline};
use crate::poller::{PollerRunSummary, ReconciliationPoller};
use crate::settings::{DaemonSettings, PollerSettings};
use crate::EngineError;

fn lock_owner(driver: &str) -> String {
    format!("{driver} pid {}", std::process::id())
}

#[must_use]
pub fn build_pipeline(
    config: &AppConfig,
    collaborators: Collaborators,
    ledger: Option<Ledger>,
    rotation: TopicRotation,
    dry_run: bool,
) -> OpportunityPipeline {
    OpportunityPipeline::new(
        DaemonSettings::from_config(config, dry_run),
        RateLimiter::new(config.burst_cap, config.hourly_cap),
        collaborators,
        ledger,
        rotation,
    )
}

#[must_use]
pub fn build_poller(
    config: &AppConfig,
    ledger: Ledger,
    metrics: Option<Arc<dyn MetricsSource>>,
    dry_run: bool,
) -> ReconciliationPoller {
    ReconciliationPoller::new(PollerSettings::from_config(config, dry_run), ledger, metrics)
}

/// Run one daemon pass under the daemon lock.
///
/// # Errors
///
/// Returns [`EngineError::State`] when another daemon run holds the lock or
/// the state file cannot be read or written.
pub async fn run_daemon(
    config: &AppConfig,
    pipeline: &OpportunityPipeline,
    clock: &dyn Clock,
) -> Result<DaemonRunSummary, EngineError> {
    let _lock = InstanceLock::acquire(
        &config.daemon_lock_path(),
        clock.now(),
        &lock_owner("daemon"),
    )?;
    let store = JsonFileStore::<DaemonState>::new(config.daemon_state_path());
    pipeline.run(&store, clock).await
}

/// Run one reconciliation pass under the poller lock.
///
/// # Errors
///
/// Returns [`EngineError::State`] when another poller run holds the lock or
/// the state file cannot be read or written.
pub async fn run_poller(
    config: &AppConfig,
    poller: &ReconciliationPoller,
    clock: &dyn Clock,
) -> Result<PollerRunSummary, EngineError> {
    let _lock = InstanceLock::acquire(
        &config.poller_lock_path(),
        clock.now(),
        &lock_owner("poller"),
    )?;
    let store = JsonFileStore::<PollerState>::new(config.poller_state_path());
    poller.run(&store, clock).await
}
