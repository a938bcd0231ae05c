//! `status` sub-command: a read-only view of both drivers' persisted state.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use outpost_core::{AppConfig, Clock, SystemClock};
use outpost_state::{DaemonState, JsonFileStore, PollerState, StateStore};

pub(crate) fn print(config: &AppConfig) -> anyhow::Result<()> {
    let mut daemon = JsonFileStore::<DaemonState>::new(config.daemon_state_path()).load()?;
    let poller = JsonFileStore::<PollerState>::new(config.poller_state_path()).load()?;
    let now = SystemClock.now();
    daemon.prune(now);
    print!("{}", render(&daemon, &poller, now));
    Ok(())
}

fn stamp(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "never".to_string(), |t| t.to_rfc3339())
}

pub(crate) fn render(daemon: &DaemonState, poller: &PollerState, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "daemon");
    let _ = writeln!(out, "  last run:        {}", stamp(daemon.last_run));
    let _ = writeln!(
        out,
        "  publishes:       {} in 5m, {} in 1h, {} in 24h",
        daemon.events_since(now - Duration::minutes(5)),
        daemon.events_since(now - Duration::hours(1)),
        daemon.events.len(),
    );
    let _ = writeln!(out, "  today:           {}", daemon.total_for(now.date_naive()));
    let _ = writeln!(
        out,
        "  last report:     {}",
        daemon
            .last_report
            .map_or_else(|| "never".to_string(), |d| d.to_string())
    );

    let _ = writeln!(out, "poller");
    let _ = writeln!(out, "  last run:        {}", stamp(poller.last_run));
    let _ = writeln!(out, "  runs:            {}", poller.run_count);
    let _ = writeln!(
        out,
        "  polled:          {} last run, {} total",
        poller.polled_last_run, poller.total_polled
    );
    let _ = writeln!(out, "  errors last run: {}", poller.errors_last_run.len());
    for error in &poller.errors_last_run {
        let _ = writeln!(
            out,
            "    {} [{}] {}: {}",
            error.kind,
            error.stage,
            error.post_id.as_deref().unwrap_or("-"),
            error.message
        );
    }
    out
}
