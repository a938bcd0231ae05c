//! Reconciliation pass: re-poll published posts on a cooldown, upsert their
//! metrics in one batch, and rebuild the per-community aggregates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use outpost_clients::{ClientError, MetricsSource};
use outpost_core::{Clock, FailureKind, LedgerRow, PerformanceRecord, RunFailure};
use outpost_ledger::{Ledger, PerformanceView};
use outpost_state::{PollerState, StateStore};
use uuid::Uuid;

use crate::aggregate::compute_aggregates;
use crate::settings::PollerSettings;
use crate::EngineError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerRunSummary {
    pub run_id: String,
    /// Posts selected for polling.
    pub planned: usize,
    /// Posts whose fresh metrics landed in the performance view.
    pub polled: Vec<String>,
    pub errors: Vec<RunFailure>,
    /// Upvotes plus comments across `polled`.
    pub engagement: u64,
    pub aggregates_written: usize,
    pub forecast_row: Option<usize>,
    /// The run stopped before polling and left `run_count` alone.
    pub aborted: bool,
}

/// Posts due for a metrics refresh, in log order, at most `cap`.
///
/// A post is due on the first ever run, when it has no performance row yet,
/// or when its last polled date is before the calendar day of
/// `now - cooldown`.
#[must_use]
pub fn plan_polls<'a>(
    log: &'a [LedgerRow],
    polled: &HashMap<&str, NaiveDate>,
    first_run: bool,
    now: DateTime<Utc>,
    cooldown: Duration,
    cap: usize,
) -> Vec<&'a LedgerRow> {
    let cutoff = (now - cooldown).date_naive();
    let mut seen = HashSet::new();
    log.iter()
        .filter(|row| seen.insert(row.post_id.as_str()))
        .filter(|row| {
            first_run
                || polled
                    .get(row.post_id.as_str())
                    .map_or(true, |last| *last < cutoff)
        })
        .take(cap)
        .collect()
}

/// Replace records by id, appending unseen ones. Used to preview aggregates
/// on a dry run, where nothing is written back.
fn overlay(existing: &[PerformanceRecord], fresh: &[PerformanceRecord]) -> Vec<PerformanceRecord> {
    let mut merged = existing.to_vec();
    for record in fresh {
        match merged.iter_mut().find(|r| r.post_id == record.post_id) {
            Some(slot) => *slot = record.clone(),
            None => merged.push(record.clone()),
        }
    }
    merged
}

pub struct ReconciliationPoller {
    settings: PollerSettings,
    ledger: Ledger,
    metrics: Option<Arc<dyn MetricsSource>>,
}

impl std::fmt::Debug for ReconciliationPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationPoller")
            .field("settings", &self.settings)
            .field("ledger", &self.ledger)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl ReconciliationPoller {
    #[must_use]
    pub fn new(
        settings: PollerSettings,
        ledger: Ledger,
        metrics: Option<Arc<dyn MetricsSource>>,
    ) -> Self {
        Self {
            settings,
            ledger,
            metrics,
        }
    }

    /// One full reconciliation pass.
    ///
    /// Item-level problems are collected into the summary and the persisted
    /// error list; only a state load or save failure is returned as `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::State`] if `PollerState` cannot be loaded or saved.
    pub async fn run(
        &self,
        store: &dyn StateStore<PollerState>,
        clock: &dyn Clock,
    ) -> Result<PollerRunSummary, EngineError> {
        let run_id = Uuid::new_v4().to_string();
        let now = clock.now();
        let today = now.date_naive();
        let dry_run = self.settings.dry_run;
        let mut state = store.load()?;
        let mut summary = PollerRunSummary {
            run_id: run_id.clone(),
            ..PollerRunSummary::default()
        };

        tracing::info!(
            run_id = %run_id,
            run_count = state.run_count + 1,
            dry_run,
            "poller run starting"
        );

        if let Err(e) = self.ledger.connect().await {
            let kind = if e.is_unauthorized() {
                FailureKind::AuthenticationFailed
            } else {
                FailureKind::CollaboratorUnavailable
            };
            tracing::error!(run_id = %run_id, stage = "connect", error = %e, "record store unavailable");
            return self.abort(store, state, summary, now, RunFailure::new(kind, "connect", e.to_string()));
        }

        let Some(metrics) = self.metrics.as_deref() else {
            tracing::warn!(run_id = %run_id, stage = "fetch", "metrics source unavailable");
            let failure = RunFailure::new(
                FailureKind::CollaboratorUnavailable,
                "fetch",
                "no metrics source configured",
            );
            return self.abort(store, state, summary, now, failure);
        };

        // Plan
        let log = match self.ledger.read_post_log().await {
            Ok(log) => log,
            Err(e) => {
                tracing::error!(run_id = %run_id, stage = "plan", error = %e, "post log read failed");
                let failure = RunFailure::new(FailureKind::ReadFailure, "plan", e.to_string());
                return self.abort(store, state, summary, now, failure);
            }
        };
        let view = match self.ledger.read_performance().await {
            Ok(view) => view,
            Err(e) => {
                tracing::error!(run_id = %run_id, stage = "plan", error = %e, "performance read failed");
                let failure = RunFailure::new(FailureKind::ReadFailure, "plan", e.to_string());
                return self.abort(store, state, summary, now, failure);
            }
        };
        Self::note_malformed(&run_id, "post log", log.skipped, &mut summary.errors);
        Self::note_malformed(&run_id, "performance", view.skipped, &mut summary.errors);

        let due = plan_polls(
            &log.rows,
            &view.polled_dates(),
            state.is_first_run(),
            now,
            self.settings.repoll_cooldown,
            self.settings.max_polls_per_run,
        );
        summary.planned = due.len();
        tracing::info!(
            run_id = %run_id,
            stage = "plan",
            logged = log.rows.len(),
            due = due.len(),
            first_run = state.is_first_run(),
            "polling plan"
        );

        // Fetch
        let fetched = self.fetch(&run_id, metrics, &due, today, &mut summary.errors).await;

        // Upsert
        let written = if fetched.is_empty() {
            Vec::new()
        } else if dry_run {
            tracing::info!(run_id = %run_id, stage = "upsert", rows = fetched.len(), "dry run: skipping upsert");
            fetched.clone()
        } else {
            let report = self.ledger.upsert_performance(&view, &fetched).await;
            for (post_id, message) in &report.failed {
                summary.errors.push(
                    RunFailure::new(FailureKind::PartialWriteFailure, "upsert", message.clone())
                        .for_post(post_id),
                );
            }
            let landed: HashSet<String> = report.written().into_iter().collect();
            fetched
                .iter()
                .filter(|r| landed.contains(&r.post_id))
                .cloned()
                .collect()
        };

        summary.polled = written.iter().map(|r| r.post_id.clone()).collect();
        summary.engagement = written.iter().map(|r| r.upvotes + r.comments).sum();

        if !written.is_empty() {
            summary.aggregates_written = self
                .recompute_aggregates(&run_id, &view, &written, today, &mut summary.errors)
                .await;
            summary.forecast_row = self
                .update_forecast(&run_id, today, summary.engagement, &mut summary.errors)
                .await;
        }

        // Persist
        let logged: HashSet<&str> = log.rows.iter().map(|r| r.post_id.as_str()).collect();
        state.retain_logged(|id| logged.contains(id));
        state.complete_run(&run_id, now, &summary.polled, summary.errors.clone());
        if dry_run {
            tracing::info!(run_id = %run_id, "dry run: poller state not persisted");
        } else {
            store.save(&state)?;
        }

        tracing::info!(
            run_id = %run_id,
            planned = summary.planned,
            polled = summary.polled.len(),
            errors = summary.errors.len(),
            engagement = summary.engagement,
            "poller run complete"
        );
        Ok(summary)
    }

    fn abort(
        &self,
        store: &dyn StateStore<PollerState>,
        mut state: PollerState,
        mut summary: PollerRunSummary,
        now: DateTime<Utc>,
        failure: RunFailure,
    ) -> Result<PollerRunSummary, EngineError> {
        summary.errors.push(failure);
        summary.aborted = true;
        state.abort_run(&summary.run_id, now, summary.errors.clone());
        if !self.settings.dry_run {
            store.save(&state)?;
        }
        tracing::warn!(run_id = %summary.run_id, errors = summary.errors.len(), "poller run aborted");
        Ok(summary)
    }

    fn note_malformed(run_id: &str, view: &str, skipped: usize, errors: &mut Vec<RunFailure>) {
        if skipped == 0 {
            return;
        }
        tracing::warn!(run_id = %run_id, view, skipped, "skipped malformed rows");
        errors.push(RunFailure::new(
            FailureKind::MalformedInput,
            "plan",
            format!("{skipped} malformed row(s) skipped in {view}"),
        ));
    }

    async fn fetch(
        &self,
        run_id: &str,
        metrics: &dyn MetricsSource,
        due: &[&LedgerRow],
        today: NaiveDate,
        errors: &mut Vec<RunFailure>,
    ) -> Vec<PerformanceRecord> {
        let mut fetched = Vec::with_capacity(due.len());
        for (i, row) in due.iter().enumerate() {
            if i > 0 && !self.settings.poll_delay.is_zero() {
                tokio::time::sleep(self.settings.poll_delay).await;
            }
            let post_id = row.post_id.as_str();
            match metrics.fetch(post_id).await {
                Ok(m) => {
                    let community = if m.community.is_empty() { &row.community } else { &m.community };
                    let title = if m.title.is_empty() { &row.title } else { &m.title };
                    let record =
                        PerformanceRecord::new(post_id, community, title, m.upvotes, m.comments, today);
                    tracing::debug!(
                        run_id = %run_id,
                        post_id,
                        upvotes = record.upvotes,
                        comments = record.comments,
                        roi = record.roi_score,
                        "polled"
                    );
                    fetched.push(record);
                }
                Err(ClientError::NotFound(_)) => {
                    tracing::warn!(run_id = %run_id, stage = "fetch", post_id, "post not found");
                    errors.push(
                        RunFailure::new(FailureKind::ItemNotFound, "fetch", "post not found")
                            .for_post(post_id),
                    );
                }
                Err(e) => {
                    tracing::warn!(run_id = %run_id, stage = "fetch", post_id, error = %e, "metrics fetch failed");
                    errors.push(
                        RunFailure::new(FailureKind::CollaboratorUnavailable, "fetch", e.to_string())
                            .for_post(post_id),
                    );
                }
            }
        }
        fetched
    }

    /// Rebuild every community row from the full performance view. Returns
    /// the number of aggregates written.
    async fn recompute_aggregates(
        &self,
        run_id: &str,
        before: &PerformanceView,
        written: &[PerformanceRecord],
        today: NaiveDate,
        errors: &mut Vec<RunFailure>,
    ) -> usize {
        let records = if self.settings.dry_run {
            overlay(&before.records, written)
        } else {
            match self.ledger.read_performance().await {
                Ok(view) => view.records,
                Err(e) => {
                    tracing::error!(run_id = %run_id, stage = "aggregate", error = %e, "performance re-read failed");
                    errors.push(RunFailure::new(FailureKind::ReadFailure, "aggregate", e.to_string()));
                    return 0;
                }
            }
        };

        let aggregates = compute_aggregates(&records, &self.settings.grade_thresholds, today);
        if self.settings.dry_run {
            for agg in &aggregates {
                tracing::info!(
                    run_id = %run_id,
                    community = %agg.community,
                    posts = agg.post_count,
                    avg_upvotes = agg.avg_upvotes,
                    grade = %agg.grade,
                    "dry run: aggregate"
                );
            }
            return aggregates.len();
        }

        match self.ledger.write_aggregates(&aggregates).await {
            Ok(()) => {
                tracing::info!(run_id = %run_id, communities = aggregates.len(), "aggregates updated");
                aggregates.len()
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, stage = "aggregate", error = %e, "aggregate write failed");
                errors.push(RunFailure::new(
                    FailureKind::PartialWriteFailure,
                    "aggregate",
                    e.to_string(),
                ));
                0
            }
        }
    }

    async fn update_forecast(
        &self,
        run_id: &str,
        today: NaiveDate,
        engagement: u64,
        errors: &mut Vec<RunFailure>,
    ) -> Option<usize> {
        if self.settings.dry_run {
            tracing::info!(run_id = %run_id, engagement, "dry run: skipping forecast update");
            return None;
        }
        match self.ledger.update_forecast(today, engagement).await {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(run_id = %run_id, stage = "forecast", error = %e, "forecast update failed");
                errors.push(RunFailure::new(
                    FailureKind::PartialWriteFailure,
                    "forecast",
                    e.to_string(),
                ));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn row(id: &str) -> LedgerRow {
        LedgerRow {
            published_at: at("2026-03-01T08:00:00Z"),
            community: "mcp".into(),
            title: format!("post {id}"),
            post_id: id.into(),
            strategy: "REACTIVE".into(),
            model: "m".into(),
            word_count: 10,
            url: String::new(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn ids(rows: &[&LedgerRow]) -> Vec<String> {
        rows.iter().map(|r| r.post_id.clone()).collect()
    }

    #[test]
    fn recently_polled_posts_are_not_due() {
        let log = vec![row("a"), row("b"), row("c")];
        let polled = HashMap::from([("b", date("2026-03-01"))]);
        let due = plan_polls(&log, &polled, false, at("2026-03-01T12:00:00Z"), Duration::hours(2), 60);
        assert_eq!(ids(&due), vec!["a", "c"]);
    }

    #[test]
    fn first_run_polls_everything_once() {
        let log = vec![row("a"), row("b"), row("a")];
        let polled = HashMap::from([("a", date("2026-03-01")), ("b", date("2026-03-01"))]);
        let due = plan_polls(&log, &polled, true, at("2026-03-01T12:00:00Z"), Duration::hours(2), 60);
        assert_eq!(ids(&due), vec!["a", "b"]);
    }

    #[test]
    fn plan_is_capped_in_log_order() {
        let log: Vec<LedgerRow> = (0..10).map(|i| row(&i.to_string())).collect();
        let due = plan_polls(&log, &HashMap::new(), false, at("2026-03-01T12:00:00Z"), Duration::hours(2), 3);
        assert_eq!(ids(&due), vec!["0", "1", "2"]);
    }

    #[test]
    fn cooldown_compares_calendar_days() {
        let log = vec![row("a")];
        let polled = HashMap::from([("a", date("2026-03-01"))]);
        // 01:30 minus 2h is still 2026-03-01.
        let due = plan_polls(&log, &polled, false, at("2026-03-02T01:30:00Z"), Duration::hours(2), 60);
        assert!(due.is_empty());
        let due = plan_polls(&log, &polled, false, at("2026-03-02T02:00:00Z"), Duration::hours(2), 60);
        assert_eq!(ids(&due), vec!["a"]);
    }

    #[test]
    fn polled_post_is_never_due_before_cooldown_elapses() {
        let log = vec![row("a")];
        let cooldown = Duration::hours(2);
        let polled_at = at("2026-03-01T23:40:00Z");
        let polled = HashMap::from([("a", polled_at.date_naive())]);
        let mut now = polled_at;
        while now < polled_at + cooldown {
            assert!(plan_polls(&log, &polled, false, now, cooldown, 60).is_empty(), "{now}");
            now += Duration::minutes(10);
        }
    }

    #[test]
    fn overlay_replaces_by_id_and_appends_new() {
        let d = date("2026-03-01");
        let existing = vec![
            PerformanceRecord::new("a", "x", "t", 1, 1, d),
            PerformanceRecord::new("b", "x", "t", 2, 2, d),
        ];
        let fresh = vec![
            PerformanceRecord::new("b", "x", "t", 9, 9, d),
            PerformanceRecord::new("c", "y", "t", 3, 0, d),
        ];
        let merged = overlay(&existing, &fresh);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].upvotes, 9);
        assert_eq!(merged[2].post_id, "c");
    }
}
