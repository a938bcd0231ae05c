//! Per-driver knobs, resolved once from [`AppConfig`].

use std::time::Duration as StdDuration;

use chrono::Duration;
use outpost_core::roi::DEFAULT_GRADE_THRESHOLDS;
use outpost_core::{AppConfig, GradeThreshold};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Publish budget for one run.
    pub max_posts_per_run: u32,
    /// How far back discovery, community-watch and reciprocation look.
    pub scan_window: Duration,
    pub min_score: u32,
    /// Items fetched per watched community.
    pub scan_limit: usize,
    /// Pause after each successful publish.
    pub publish_delay: StdDuration,
    pub reciprocate_limit: usize,
    /// Length of long-form financial drafts.
    pub proactive_max_words: u32,
    /// Length of conversational proactive drafts.
    pub social_max_words: u32,
    pub reply_max_words: u32,
    /// Our own account, never reciprocated or replied to.
    pub self_login: Option<String>,
    /// Draft and log, but never publish or write to the ledger or state.
    pub dry_run: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            max_posts_per_run: 4,
            scan_window: Duration::hours(1),
            min_score: 15,
            scan_limit: 5,
            publish_delay: StdDuration::from_secs(3),
            reciprocate_limit: 2,
            proactive_max_words: 400,
            social_max_words: 200,
            reply_max_words: 120,
            self_login: None,
            dry_run: false,
        }
    }
}

impl DaemonSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Self {
        Self {
            max_posts_per_run: config.max_posts_per_run,
            scan_window: Duration::hours(i64::from(config.scan_window_hours)),
            min_score: config.min_opportunity_score,
            scan_limit: config.scan_limit,
            publish_delay: StdDuration::from_millis(config.publish_delay_ms),
            reciprocate_limit: config.reciprocate_limit,
            proactive_max_words: config.proactive_max_words,
            social_max_words: config.social_max_words,
            reply_max_words: config.reply_max_words,
            self_login: config.github_self_login.clone(),
            dry_run,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollerSettings {
    pub repoll_cooldown: Duration,
    pub max_polls_per_run: usize,
    /// Pause between consecutive metric fetches.
    pub poll_delay: StdDuration,
    /// Highest threshold first.
    pub grade_thresholds: Vec<GradeThreshold>,
    /// Fetch and compute, but write nothing and persist no state.
    pub dry_run: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            repoll_cooldown: Duration::hours(2),
            max_polls_per_run: 60,
            poll_delay: StdDuration::from_millis(300),
            grade_thresholds: DEFAULT_GRADE_THRESHOLDS
                .iter()
                .map(|(min, grade)| GradeThreshold {
                    min_avg_upvotes: *min,
                    grade: (*grade).to_string(),
                })
                .collect(),
            dry_run: false,
        }
    }
}

impl PollerSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Self {
        Self {
            repoll_cooldown: Duration::hours(i64::from(config.repoll_cooldown_hours)),
            max_polls_per_run: config.max_polls_per_run,
            poll_delay: StdDuration::from_millis(config.poll_delay_ms),
            grade_thresholds: config.roi_grade_thresholds.clone(),
            dry_run,
        }
    }
}
