//! One pass of each driver, wired from configuration.

use std::sync::Arc;

use anyhow::Context;
use outpost_clients::Collaborators;
use outpost_core::{load_topics, AppConfig, SystemClock};
use outpost_engine::{build_pipeline, build_poller, run_daemon, run_poller, EngineError};
use outpost_ledger::{Ledger, LedgerViews, SheetsRecordStore};
use outpost_state::StateError;

/// The ledger, when its spreadsheet credentials are configured.
fn open_ledger(config: &AppConfig) -> anyhow::Result<Option<Ledger>> {
    let store = SheetsRecordStore::from_config(config).context("failed to build ledger client")?;
    Ok(store.map(|s| Ledger::new(Arc::new(s), LedgerViews::default())))
}

/// A lock held by another run is not a failure: this pass is simply skipped.
fn skipped_if_locked<T>(result: Result<T, EngineError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(summary) => Ok(Some(summary)),
        Err(EngineError::State(StateError::Locked { path, owner })) => {
            tracing::warn!(
                path = %path.display(),
                owner = %owner,
                "another run holds the lock, skipping"
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn daemon_pass(config: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let collaborators = Collaborators::from_config(config, ledger.clone())
        .context("failed to build collaborator clients")?;
    let rotation = load_topics(&config.topics_path)?;
    let pipeline = build_pipeline(config, collaborators, ledger, rotation, dry_run);

    let Some(summary) = skipped_if_locked(run_daemon(config, &pipeline, &SystemClock).await)?
    else {
        return Ok(());
    };

    println!(
        "daemon run {}: {} opportunities, {} of {} budget used, {} published, {} proactive, {} replies, {} reciprocated, {} failures",
        summary.run_id,
        summary.opportunities,
        summary.budget_used,
        config.max_posts_per_run,
        summary.published.len(),
        summary.proactive,
        summary.replies,
        summary.reciprocated.len(),
        summary.failures.len(),
    );
    if let Some(reason) = &summary.rate_limited {
        println!("  rate limited: {reason}");
    }
    Ok(())
}

pub(crate) async fn poller_pass(config: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let Some(ledger) = open_ledger(config)? else {
        anyhow::bail!("the poller needs LEDGER_SPREADSHEET_ID and LEDGER_ACCESS_TOKEN");
    };
    let collaborators = Collaborators::from_config(config, Some(ledger.clone()))
        .context("failed to build collaborator clients")?;
    let poller = build_poller(config, ledger, collaborators.metrics, dry_run);

    let Some(summary) = skipped_if_locked(run_poller(config, &poller, &SystemClock).await)? else {
        return Ok(());
    };

    println!(
        "poller run {}: {} planned, {} polled, engagement {}, {} aggregates, {} errors{}",
        summary.run_id,
        summary.planned,
        summary.polled.len(),
        summary.engagement,
        summary.aggregates_written,
        summary.errors.len(),
        if summary.aborted { " (aborted)" } else { "" },
    );
    for error in &summary.errors {
        println!(
            "  {} [{}] {}: {}",
            error.kind,
            error.stage,
            error.post_id.as_deref().unwrap_or("-"),
            error.message
        );
    }
    Ok(())
}
