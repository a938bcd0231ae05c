//! Reconciliation runs against a fake metrics source and the in-memory ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use outpost_clients::{ClientError, MetricsSource, PostMetrics};
use outpost_core::{FailureKind, FixedClock};
use outpost_engine::{PollerSettings, ReconciliationPoller};
use outpost_ledger::{columns, Ledger, LedgerViews, MemoryRecordStore};
use outpost_state::{MemoryStore, PollerState};

const PERFORMANCE: &str = "POST PERFORMANCE";

fn now() -> DateTime<Utc> {
    "2026-03-02T12:00:00Z".parse().unwrap()
}

fn settings() -> PollerSettings {
    PollerSettings {
        poll_delay: StdDuration::ZERO,
        ..PollerSettings::default()
    }
}

/// Serves fixed metrics per id; unknown ids are not found.
#[derive(Default)]
struct FakeMetrics {
    known: Mutex<HashMap<String, PostMetrics>>,
    requested: Mutex<Vec<String>>,
}

impl FakeMetrics {
    fn with(entries: &[(&str, u64, u64)]) -> Self {
        let metrics = Self::default();
        for (id, up, co) in entries {
            metrics.set(id, *up, *co);
        }
        metrics
    }

    fn set(&self, id: &str, upvotes: u64, comments: u64) {
        self.known.lock().unwrap().insert(
            id.to_string(),
            PostMetrics {
                upvotes,
                comments,
                community: String::new(),
                title: String::new(),
            },
        );
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSource for FakeMetrics {
    async fn fetch(&self, post_id: &str) -> Result<PostMetrics, ClientError> {
        self.requested.lock().unwrap().push(post_id.to_string());
        self.known
            .lock()
            .unwrap()
            .get(post_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(post_id.to_string()))
    }
}

fn log_row<'a>(id: &'a str, community: &'a str) -> Vec<&'a str> {
    vec!["2026-03-01", "08:00:00", community, "A title", id, "REACTIVE", "m1", "40", ""]
}

fn store_with_log(ids: &[&str]) -> MemoryRecordStore {
    MemoryRecordStore::new()
        .with_view(
            "POST LOG",
            columns::POST_LOG,
            ids.iter().map(|id| log_row(id, "mcp")).collect(),
        )
        .with_view(PERFORMANCE, columns::POST_PERFORMANCE, vec![])
}

fn poller(
    store: &Arc<MemoryRecordStore>,
    metrics: &Arc<FakeMetrics>,
    settings: PollerSettings,
) -> ReconciliationPoller {
    ReconciliationPoller::new(
        settings,
        Ledger::new(store.clone(), LedgerViews::default()),
        Some(metrics.clone()),
    )
}

fn after_first_run() -> MemoryStore<PollerState> {
    MemoryStore::with_state(PollerState {
        run_count: 1,
        ..PollerState::default()
    })
}

#[tokio::test]
async fn plan_skips_ids_polled_within_cooldown() {
    let store = Arc::new(
        MemoryRecordStore::new()
            .with_view(
                "POST LOG",
                columns::POST_LOG,
                vec![log_row("a", "mcp"), log_row("b", "mcp"), log_row("c", "mcp")],
            )
            .with_view(
                PERFORMANCE,
                columns::POST_PERFORMANCE,
                vec![vec!["b", "mcp", "A title", "4", "1", "13", "2026-03-02"]],
            ),
    );
    let metrics = Arc::new(FakeMetrics::with(&[("a", 1, 0), ("b", 9, 9), ("c", 2, 0)]));
    let state = after_first_run();

    let summary = poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    assert_eq!(summary.planned, 2);
    assert_eq!(metrics.requested(), vec!["a", "c"]);
    assert_eq!(summary.polled, vec!["a", "c"]);
}

#[tokio::test]
async fn missing_item_is_one_error_and_one_fewer_row() {
    let store = Arc::new(store_with_log(&["a", "gone"]));
    let metrics = Arc::new(FakeMetrics::with(&[("a", 3, 1)]));
    let state = MemoryStore::<PollerState>::new();

    let summary = poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    let rows = store.rows(PERFORMANCE);
    assert_eq!(rows.len(), 2, "header plus exactly one new row");
    assert_eq!(rows[1][0], "a");
    assert_eq!(rows[1][5], "11");

    let saved = state.current().unwrap();
    assert_eq!(saved.errors_last_run.len(), 1);
    assert_eq!(saved.errors_last_run[0].kind, FailureKind::ItemNotFound);
    assert_eq!(saved.errors_last_run[0].post_id.as_deref(), Some("gone"));
    assert_eq!(saved.run_count, 1);
    assert_eq!(saved.polled_last_run, 1);
    assert!(saved.polled_at.contains_key("a"));
    assert!(!saved.polled_at.contains_key("gone"));
    assert_eq!(summary.errors, saved.errors_last_run);
}

#[tokio::test]
async fn poll_times_of_posts_dropped_from_the_log_are_forgotten() {
    let store = Arc::new(store_with_log(&["a"]));
    let metrics = Arc::new(FakeMetrics::with(&[("a", 3, 1)]));
    let mut seeded = PollerState {
        run_count: 1,
        ..PollerState::default()
    };
    seeded
        .polled_at
        .insert("retired".to_string(), now() - Duration::days(30));
    let state = MemoryStore::with_state(seeded);

    poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    let saved = state.current().unwrap();
    let ids: Vec<&str> = saved.polled_at.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["a"]);
}

#[tokio::test]
async fn repeated_runs_converge_without_duplicate_rows() {
    let store = Arc::new(store_with_log(&["a", "b"]));
    let metrics = Arc::new(FakeMetrics::with(&[("a", 1, 0), ("b", 2, 0)]));
    let state = MemoryStore::<PollerState>::new();
    let poller = poller(&store, &metrics, settings());

    poller.run(&state, &FixedClock(now())).await.unwrap();
    let after_first = store.rows(PERFORMANCE);
    let appends = store.append_calls();
    let updates = store.update_calls();

    // Inside the cooldown nothing is re-polled or rewritten.
    let quiet = poller
        .run(&state, &FixedClock(now() + Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(quiet.planned, 0);
    assert_eq!(store.rows(PERFORMANCE), after_first);
    assert_eq!(store.append_calls(), appends);
    assert_eq!(store.update_calls(), updates);

    // Next day, fresh metrics overwrite the existing rows in one batch.
    metrics.set("a", 10, 4);
    let later = poller
        .run(&state, &FixedClock(now() + Duration::days(1)))
        .await
        .unwrap();
    assert_eq!(later.polled, vec!["a", "b"]);

    let rows = store.rows(PERFORMANCE);
    assert_eq!(rows.len(), 3);
    let a = rows.iter().find(|r| r[0] == "a").unwrap();
    assert_eq!(a[3], "10");
    assert_eq!(a[4], "4");
    assert_eq!(a[6], "2026-03-03");
    // One batch for the performance rows, one for the existing community row.
    assert_eq!(store.update_calls(), updates + 2);
    assert_eq!(store.append_calls(), appends);
    assert_eq!(state.current().unwrap().run_count, 3);
}

#[tokio::test]
async fn aggregates_are_rebuilt_from_the_whole_view() {
    let store = Arc::new(
        MemoryRecordStore::new()
            .with_view(
                "POST LOG",
                columns::POST_LOG,
                vec![log_row("a", "mcp"), log_row("b", "mcp"), log_row("c", "finance")],
            )
            .with_view(
                PERFORMANCE,
                columns::POST_PERFORMANCE,
                vec![vec!["old", "mcp", "Earlier", "2", "0", "4", "2026-02-01"]],
            ),
    );
    let metrics = Arc::new(FakeMetrics::with(&[("a", 10, 2), ("b", 3, 0), ("c", 1, 0)]));
    let state = MemoryStore::<PollerState>::new();

    let summary = poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    assert_eq!(summary.aggregates_written, 2);
    let communities = store.rows("COMMUNITY PERFORMANCE");
    assert_eq!(communities[0][0], "Community");
    let mcp = communities.iter().find(|r| r[0] == "mcp").unwrap();
    // old + a + b: 15 upvotes over 3 posts.
    assert_eq!(mcp[1], "3");
    assert_eq!(mcp[2], "15");
    assert_eq!(mcp[4], "5.00");
    assert_eq!(mcp[6], "a");
    assert_eq!(mcp[7], "A");
    let finance = communities.iter().find(|r| r[0] == "finance").unwrap();
    assert_eq!(finance[7], "C");
}

#[tokio::test]
async fn mixed_case_community_lands_in_a_single_aggregate_row() {
    let store = Arc::new(
        MemoryRecordStore::new()
            .with_view(
                "POST LOG",
                columns::POST_LOG,
                vec![log_row("a", "mcp"), log_row("b", "Mcp")],
            )
            .with_view(
                PERFORMANCE,
                columns::POST_PERFORMANCE,
                vec![vec!["old", "MCP", "Earlier", "20", "0", "40", "2026-02-01"]],
            )
            .with_view(
                "COMMUNITY PERFORMANCE",
                columns::COMMUNITY_PERFORMANCE,
                vec![vec!["MCP", "1", "20", "0", "20.00", "0.00", "old", "A", "2026-02-01"]],
            ),
    );
    let metrics = Arc::new(FakeMetrics::with(&[("a", 2, 0), ("b", 1, 0)]));

    let summary = poller(&store, &metrics, settings())
        .run(&MemoryStore::<PollerState>::new(), &FixedClock(now()))
        .await
        .unwrap();

    assert_eq!(summary.aggregates_written, 1);
    let communities = store.rows("COMMUNITY PERFORMANCE");
    assert_eq!(communities.len(), 2);
    assert_eq!(communities[1][0], "MCP");
    assert_eq!(communities[1][1], "3");
    assert_eq!(communities[1][2], "23");
    assert_eq!(communities[1][6], "old");
}

#[tokio::test]
async fn forecast_week_receives_run_engagement() {
    let store = Arc::new(store_with_log(&["a", "b"]).with_view(
        "WEEKLY FORECAST",
        columns::WEEKLY_FORECAST,
        vec![
            vec!["2026-02-23", "2026-03-01", "20", "0", "100", "55"],
            vec!["2026-03-02", "2026-03-08", "20", "0", "100", ""],
        ],
    ));
    let metrics = Arc::new(FakeMetrics::with(&[("a", 4, 1), ("b", 2, 3)]));

    let summary = poller(&store, &metrics, settings())
        .run(&MemoryStore::<PollerState>::new(), &FixedClock(now()))
        .await
        .unwrap();

    assert_eq!(summary.engagement, 10);
    assert_eq!(summary.forecast_row, Some(2));
    let forecast = store.rows("WEEKLY FORECAST");
    assert_eq!(forecast[1][5], "55");
    assert_eq!(forecast[2][5], "10");
}

#[tokio::test]
async fn rejected_credentials_abort_before_planning() {
    let store = Arc::new(store_with_log(&["a"]));
    store.reject_credentials();
    let metrics = Arc::new(FakeMetrics::with(&[("a", 1, 1)]));
    let state = after_first_run();

    let summary = poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    assert!(summary.aborted);
    assert!(metrics.requested().is_empty());
    let saved = state.current().unwrap();
    assert_eq!(saved.run_count, 1, "aborted runs are not counted");
    assert_eq!(saved.last_run, Some(now()));
    assert_eq!(saved.errors_last_run.len(), 1);
    assert_eq!(saved.errors_last_run[0].kind, FailureKind::AuthenticationFailed);
    assert_eq!(store.rows(PERFORMANCE).len(), 1);
}

#[tokio::test]
async fn unreadable_post_log_aborts_with_read_failure() {
    let store = Arc::new(store_with_log(&["a"]));
    store.fail_reads_for("POST LOG");
    let metrics = Arc::new(FakeMetrics::with(&[("a", 1, 1)]));
    let state = MemoryStore::<PollerState>::new();

    let summary = poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    assert!(summary.aborted);
    let saved = state.current().unwrap();
    assert!(saved.is_first_run());
    assert_eq!(saved.errors_last_run[0].kind, FailureKind::ReadFailure);
}

#[tokio::test]
async fn missing_metrics_source_aborts_the_run() {
    let store = Arc::new(store_with_log(&["a"]));
    let poller = ReconciliationPoller::new(
        settings(),
        Ledger::new(store.clone(), LedgerViews::default()),
        None,
    );
    let state = MemoryStore::<PollerState>::new();

    let summary = poller.run(&state, &FixedClock(now())).await.unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.errors[0].kind, FailureKind::CollaboratorUnavailable);
    assert_eq!(state.current().unwrap().run_count, 0);
}

#[tokio::test]
async fn failed_batch_write_leaves_ids_unpolled() {
    let store = Arc::new(store_with_log(&["a", "b"]));
    store.fail_writes_for(PERFORMANCE);
    let metrics = Arc::new(FakeMetrics::with(&[("a", 1, 0), ("b", 1, 0)]));
    let state = MemoryStore::<PollerState>::new();

    let summary = poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    assert!(summary.polled.is_empty());
    assert_eq!(store.append_calls(), 1, "one batched append attempt");
    let saved = state.current().unwrap();
    assert_eq!(saved.run_count, 1);
    assert!(saved.polled_at.is_empty());
    let failed: Vec<Option<&str>> = saved
        .errors_last_run
        .iter()
        .filter(|e| e.kind == FailureKind::PartialWriteFailure)
        .map(|e| e.post_id.as_deref())
        .collect();
    assert_eq!(failed, vec![Some("a"), Some("b")]);
}

#[tokio::test]
async fn aggregate_write_failure_is_recorded_not_fatal() {
    let store = Arc::new(store_with_log(&["a"]));
    store.fail_writes_for("COMMUNITY PERFORMANCE");
    let metrics = Arc::new(FakeMetrics::with(&[("a", 1, 0)]));
    let state = MemoryStore::<PollerState>::new();

    let summary = poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    assert_eq!(summary.polled, vec!["a"]);
    assert_eq!(summary.aggregates_written, 0);
    let saved = state.current().unwrap();
    assert_eq!(saved.errors_last_run.len(), 1);
    assert_eq!(saved.errors_last_run[0].stage, "aggregate");
    assert!(saved.polled_at.contains_key("a"));
}

#[tokio::test]
async fn malformed_row_is_reported_and_repaired_in_place() {
    let store = Arc::new(
        MemoryRecordStore::new()
            .with_view("POST LOG", columns::POST_LOG, vec![log_row("a", "mcp")])
            .with_view(
                PERFORMANCE,
                columns::POST_PERFORMANCE,
                vec![vec!["a", "mcp", "A title", "lots", "1", "", "2026-03-02"]],
            ),
    );
    let metrics = Arc::new(FakeMetrics::with(&[("a", 6, 1)]));
    let state = after_first_run();

    let summary = poller(&store, &metrics, settings())
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    assert!(summary
        .errors
        .iter()
        .any(|e| e.kind == FailureKind::MalformedInput));
    let rows = store.rows(PERFORMANCE);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][3], "6");
}

#[tokio::test]
async fn per_run_cap_bounds_fetches() {
    let store = Arc::new(store_with_log(&["a", "b", "c", "d"]));
    let metrics = Arc::new(FakeMetrics::with(&[("a", 1, 0), ("b", 1, 0), ("c", 1, 0), ("d", 1, 0)]));
    let capped = PollerSettings {
        max_polls_per_run: 3,
        ..settings()
    };

    let summary = poller(&store, &metrics, capped)
        .run(&MemoryStore::<PollerState>::new(), &FixedClock(now()))
        .await
        .unwrap();

    assert_eq!(summary.planned, 3);
    assert_eq!(metrics.requested(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn dry_run_computes_but_writes_nothing() {
    let store = Arc::new(store_with_log(&["a", "b"]));
    let metrics = Arc::new(FakeMetrics::with(&[("a", 1, 0), ("b", 5, 2)]));
    let state = MemoryStore::<PollerState>::new();
    let dry = PollerSettings {
        dry_run: true,
        ..settings()
    };

    let summary = poller(&store, &metrics, dry)
        .run(&state, &FixedClock(now()))
        .await
        .unwrap();

    assert_eq!(summary.polled, vec!["a", "b"]);
    assert_eq!(summary.aggregates_written, 1);
    assert_eq!(summary.forecast_row, None);
    assert_eq!(store.append_calls() + store.update_calls() + store.cell_calls(), 0);
    assert_eq!(state.save_count(), 0);
}
