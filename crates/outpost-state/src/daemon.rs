//! The posting daemon's persisted rolling window.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use outpost_core::PublishEvent;
use serde::{Deserialize, Serialize};

/// Publish events older than this are dropped on every load.
pub const EVENT_RETENTION_HOURS: i64 = 24;

/// Discussions remembered as already answered.
pub const REPLIED_DISCUSSIONS_KEPT: usize = 50;

/// Running publish count for one UTC calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: Option<NaiveDate>,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonState {
    /// Insertion order, not necessarily sorted by time.
    #[serde(default)]
    pub events: Vec<PublishEvent>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub daily_total: DailyTotal,
    /// Date of the last daily report sent.
    #[serde(default)]
    pub last_report: Option<NaiveDate>,
    /// Ids of discussions already replied to, oldest first.
    #[serde(default)]
    pub replied_discussions: Vec<String>,
}

impl DaemonState {
    /// Drop events older than the retention window, keeping the rest in order.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(EVENT_RETENTION_HOURS);
        self.events.retain(|e| e.at >= cutoff);
    }

    /// Append a publish, re-prune, and bump the day's running total.
    pub fn record_publish(&mut self, event: PublishEvent) {
        let day = event.at.date_naive();
        if self.daily_total.date != Some(day) {
            self.daily_total = DailyTotal {
                date: Some(day),
                count: 0,
            };
        }
        self.daily_total.count = self.daily_total.count.saturating_add(1);
        let at = event.at;
        self.events.push(event);
        self.prune(at);
    }

    /// Number of retained events at or after `since`.
    #[must_use]
    pub fn events_since(&self, since: DateTime<Utc>) -> usize {
        self.events.iter().filter(|e| e.at >= since).count()
    }

    /// Posts counted for `day`, zero when the running total belongs to another day.
    #[must_use]
    pub fn total_for(&self, day: NaiveDate) -> u32 {
        if self.daily_total.date == Some(day) {
            self.daily_total.count
        } else {
            0
        }
    }

    #[must_use]
    pub fn has_replied(&self, discussion_id: &str) -> bool {
        self.replied_discussions.iter().any(|id| id == discussion_id)
    }

    /// Remember a reply, forgetting the oldest beyond [`REPLIED_DISCUSSIONS_KEPT`].
    pub fn record_reply(&mut self, discussion_id: String) {
        if self.has_replied(&discussion_id) {
            return;
        }
        self.replied_discussions.push(discussion_id);
        let excess = self
            .replied_discussions
            .len()
            .saturating_sub(REPLIED_DISCUSSIONS_KEPT);
        self.replied_discussions.drain(..excess);
    }

    /// Whether no report has been sent yet for `today`.
    #[must_use]
    pub fn report_due(&self, today: NaiveDate) -> bool {
        !matches!(self.last_report, Some(sent) if sent >= today)
    }
}
