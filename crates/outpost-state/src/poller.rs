//! The reconciliation poller's persisted run history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use outpost_core::RunFailure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerState {
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_id: Option<String>,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default)]
    pub total_polled: u64,
    #[serde(default)]
    pub polled_last_run: u64,
    /// Last successful fetch per post id.
    #[serde(default)]
    pub polled_at: BTreeMap<String, DateTime<Utc>>,
    /// Replaced wholesale every run.
    #[serde(default)]
    pub errors_last_run: Vec<RunFailure>,
}

impl PollerState {
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.run_count == 0
    }

    /// Fold one completed run into the history.
    pub fn complete_run(
        &mut self,
        run_id: &str,
        now: DateTime<Utc>,
        polled_ids: &[String],
        errors: Vec<RunFailure>,
    ) {
        self.last_run = Some(now);
        self.last_run_id = Some(run_id.to_string());
        self.run_count = self.run_count.saturating_add(1);
        let polled = polled_ids.len() as u64;
        self.polled_last_run = polled;
        self.total_polled = self.total_polled.saturating_add(polled);
        for id in polled_ids {
            self.polled_at.insert(id.clone(), now);
        }
        self.errors_last_run = errors;
    }

    /// Forget last-poll times of posts that `logged` no longer lists.
    pub fn retain_logged<F>(&mut self, logged: F)
    where
        F: Fn(&str) -> bool,
    {
        self.polled_at.retain(|id, _| logged(id));
    }

    /// Record a run that stopped before polling anything. `run_count` is left alone.
    pub fn abort_run(&mut self, run_id: &str, now: DateTime<Utc>, errors: Vec<RunFailure>) {
        self.last_run = Some(now);
        self.last_run_id = Some(run_id.to_string());
        self.polled_last_run = 0;
        self.errors_last_run = errors;
    }
}

#[cfg(test)]
mod tests {
    use outpost_core::FailureKind;

    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn complete_run_accumulates_and_overwrites_errors() {
        let mut state = PollerState {
            errors_last_run: vec![
                RunFailure::new(FailureKind::ItemNotFound, "fetch", "gone").for_post("old")
            ],
            ..PollerState::default()
        };
        assert!(state.is_first_run());

        state.complete_run(
            "run-1",
            at("2026-03-01T10:00:00Z"),
            &["a".to_string(), "b".to_string()],
            Vec::new(),
        );
        state.complete_run("run-2", at("2026-03-01T12:00:00Z"), &["a".to_string()], Vec::new());

        assert_eq!(state.run_count, 2);
        assert_eq!(state.total_polled, 3);
        assert_eq!(state.polled_last_run, 1);
        assert_eq!(state.polled_at["a"], at("2026-03-01T12:00:00Z"));
        assert_eq!(state.polled_at["b"], at("2026-03-01T10:00:00Z"));
        assert!(state.errors_last_run.is_empty());
        assert_eq!(state.last_run_id.as_deref(), Some("run-2"));
    }

    #[test]
    fn retain_logged_drops_posts_gone_from_the_log() {
        let mut state = PollerState::default();
        state.complete_run(
            "run-1",
            at("2026-03-01T10:00:00Z"),
            &["a".to_string(), "b".to_string(), "c".to_string()],
            Vec::new(),
        );

        state.retain_logged(|id| id != "b");

        let ids: Vec<&str> = state.polled_at.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(state.total_polled, 3);
    }

    #[test]
    fn abort_run_keeps_run_count() {
        let mut state = PollerState::default();
        state.abort_run(
            "run-x",
            at("2026-03-01T10:00:00Z"),
            vec![RunFailure::new(
                FailureKind::AuthenticationFailed,
                "connect",
                "401",
            )],
        );
        assert_eq!(state.run_count, 0);
        assert_eq!(state.errors_last_run.len(), 1);
        assert!(state.last_run.is_some());
    }
}
