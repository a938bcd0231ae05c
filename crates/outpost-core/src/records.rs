//! Domain records written by the daemon and the poller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::roi::roi_score;

/// A successful publish, kept in the daemon's rolling 24h window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishEvent {
    pub at: DateTime<Utc>,
    pub community: String,
    pub post_id: String,
}

/// One append-only `POST LOG` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub published_at: DateTime<Utc>,
    pub community: String,
    pub title: String,
    pub post_id: String,
    /// Strategy tag, `REACTIVE` for replies to discovered opportunities.
    pub strategy: String,
    /// Model that drafted the content.
    pub model: String,
    pub word_count: usize,
    pub url: String,
}

impl LedgerRow {
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.published_at.date_naive()
    }
}

/// Latest engagement metrics for one published post. At most one per `post_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceRecord {
    pub post_id: String,
    pub community: String,
    pub title: String,
    pub upvotes: u64,
    pub comments: u64,
    pub roi_score: u64,
    pub date_polled: NaiveDate,
}

impl PerformanceRecord {
    #[must_use]
    pub fn new(
        post_id: &str,
        community: &str,
        title: &str,
        upvotes: u64,
        comments: u64,
        date_polled: NaiveDate,
    ) -> Self {
        Self {
            post_id: post_id.to_string(),
            community: community.to_string(),
            title: title.to_string(),
            upvotes,
            comments,
            roi_score: roi_score(upvotes, comments),
            date_polled,
        }
    }
}

/// Per-community summary, always recomputed from the full performance view.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityAggregate {
    pub community: String,
    pub post_count: usize,
    pub total_upvotes: u64,
    pub total_comments: u64,
    pub avg_upvotes: f64,
    pub avg_comments: f64,
    pub best_post: String,
    pub grade: String,
    pub computed_on: NaiveDate,
}

/// A calendar-week row of the forecast view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastWeek {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ForecastWeek {
    /// Both ends are inclusive.
    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// A note about a counterparty the daemon interacted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipNote {
    pub at: DateTime<Utc>,
    pub platform: String,
    pub counterparty: String,
    pub note: String,
    pub tags: Vec<String>,
}

/// End-of-day summary built from the day's `POST LOG` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub posts: usize,
    /// Distinct, in first-seen order.
    pub communities: Vec<String>,
    pub strategies: Vec<String>,
    pub models: Vec<String>,
    pub titles: Vec<String>,
}

impl DailyReport {
    #[must_use]
    pub fn from_rows(date: NaiveDate, rows: &[LedgerRow]) -> Self {
        let mut report = Self {
            date,
            posts: 0,
            communities: Vec::new(),
            strategies: Vec::new(),
            models: Vec::new(),
            titles: Vec::new(),
        };
        for row in rows.iter().filter(|r| r.date() == date) {
            report.posts += 1;
            push_distinct(&mut report.communities, &row.community);
            push_distinct(&mut report.strategies, &row.strategy);
            push_distinct(&mut report.models, &row.model);
            report.titles.push(row.title.clone());
        }
        report
    }

    /// Plain-text rendering for chat notifications.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = format!("Daily report {}: {} post(s)", self.date, self.posts);
        if self.posts == 0 {
            return text;
        }
        text.push_str(&format!("\ncommunities: {}", self.communities.join(", ")));
        text.push_str(&format!("\nstrategies: {}", self.strategies.join(", ")));
        text.push_str(&format!("\nmodels: {}", self.models.join(", ")));
        for title in &self.titles {
            text.push_str(&format!("\n- {title}"));
        }
        text
    }
}

fn push_distinct(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn performance_record_derives_roi() {
        let rec = PerformanceRecord::new("p1", "mcp", "t", 4, 2, day("2026-03-01"));
        assert_eq!(rec.roi_score, 18);
    }

    #[test]
    fn forecast_week_bounds_are_inclusive() {
        let week = ForecastWeek {
            start: day("2026-03-01"),
            end: day("2026-03-07"),
        };
        assert!(week.contains(day("2026-03-01")));
        assert!(week.contains(day("2026-03-07")));
        assert!(!week.contains(day("2026-03-08")));
        assert!(!week.contains(day("2026-02-28")));
    }

    fn row(at: &str, community: &str, strategy: &str) -> LedgerRow {
        LedgerRow {
            published_at: at.parse().unwrap(),
            community: community.to_string(),
            title: format!("{community} post"),
            post_id: "id".to_string(),
            strategy: strategy.to_string(),
            model: "m1".to_string(),
            word_count: 100,
            url: String::new(),
        }
    }

    #[test]
    fn daily_report_counts_only_that_day_and_dedupes() {
        let rows = vec![
            row("2026-03-01T23:00:00Z", "defi", "REACTIVE"),
            row("2026-03-02T01:00:00Z", "mcp", "REACTIVE"),
            row("2026-03-02T02:00:00Z", "mcp", "TOOLING_SHOWCASE"),
        ];
        let report = DailyReport::from_rows(day("2026-03-02"), &rows);
        assert_eq!(report.posts, 2);
        assert_eq!(report.communities, vec!["mcp"]);
        assert_eq!(report.strategies, vec!["REACTIVE", "TOOLING_SHOWCASE"]);
        assert_eq!(report.models, vec!["m1"]);
        assert!(report.render().starts_with("Daily report 2026-03-02: 2 post(s)"));
    }

    #[test]
    fn empty_daily_report_renders_one_line() {
        let report = DailyReport::from_rows(day("2026-03-02"), &[]);
        assert_eq!(report.render(), "Daily report 2026-03-02: 0 post(s)");
    }

    #[test]
    fn publish_event_round_trips_through_json() {
        let event = PublishEvent {
            at: "2026-03-01T12:00:00Z".parse().unwrap(),
            community: "agents".to_string(),
            post_id: "abc".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PublishEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
