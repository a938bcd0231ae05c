//! In-process cron host for deployments without a system scheduler.
//!
//! Each firing runs a full pass under the driver's instance lock, so an
//! overrun simply skips the next tick.

use std::sync::Arc;

use outpost_core::AppConfig;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::passes;

/// Builds and starts the scheduler with the daemon and poller jobs.
///
/// The returned handle must be kept alive; dropping it stops all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if a cron expression is invalid or the
/// scheduler cannot start.
pub(crate) async fn build_scheduler(
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_daemon_job(&scheduler, Arc::clone(&config)).await?;
    register_poller_job(&scheduler, config).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_daemon_job(
    scheduler: &JobScheduler,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let cron = config.daemon_cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let config = Arc::clone(&config);
        Box::pin(async move {
            tracing::info!("scheduler: starting daemon pass");
            if let Err(e) = passes::daemon_pass(&config, false).await {
                tracing::error!(error = %e, "scheduler: daemon pass failed");
            }
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: daemon job registered");
    Ok(())
}

async fn register_poller_job(
    scheduler: &JobScheduler,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let cron = config.poller_cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let config = Arc::clone(&config);
        Box::pin(async move {
            tracing::info!("scheduler: starting poller pass");
            if let Err(e) = passes::poller_pass(&config, false).await {
                tracing::error!(error = %e, "scheduler: poller pass failed");
            }
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: poller job registered");
    Ok(())
}

/// Run both jobs until ctrl-c.
pub(crate) async fn run(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(config).await?;
    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");
    scheduler.shutdown().await?;
    Ok(())
}
