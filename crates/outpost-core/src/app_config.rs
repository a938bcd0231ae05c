use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// One step of the ROI grading ladder: communities whose average upvotes per
/// post reach `min_avg_upvotes` earn `grade`.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeThreshold {
    pub min_avg_upvotes: f64,
    pub grade: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub state_dir: PathBuf,
    pub topics_path: PathBuf,

    pub max_posts_per_run: u32,
    pub burst_cap: usize,
    pub hourly_cap: usize,
    pub min_opportunity_score: u32,
    pub scan_window_hours: u32,
    pub scan_limit: usize,
    pub publish_delay_ms: u64,
    pub reciprocate_limit: usize,
    pub proactive_max_words: u32,
    pub social_max_words: u32,
    pub reply_max_words: u32,

    pub repoll_cooldown_hours: u32,
    pub max_polls_per_run: usize,
    pub poll_delay_ms: u64,
    /// Sorted by `min_avg_upvotes`, highest first.
    pub roi_grade_thresholds: Vec<GradeThreshold>,

    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,

    pub daemon_cron: String,
    pub poller_cron: String,

    pub community_api_key: Option<String>,
    pub community_base_url: String,
    pub community_watch_list: Vec<String>,
    pub composer_api_key: Option<String>,
    pub composer_base_url: String,
    pub composer_model: String,
    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_self_login: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub ledger_spreadsheet_id: Option<String>,
    pub ledger_access_token: Option<String>,
    pub ledger_base_url: String,
}

impl AppConfig {
    #[must_use]
    pub fn daemon_state_path(&self) -> PathBuf {
        self.state_dir.join("daemon_state.json")
    }

    #[must_use]
    pub fn poller_state_path(&self) -> PathBuf {
        self.state_dir.join("poller_state.json")
    }

    #[must_use]
    pub fn daemon_lock_path(&self) -> PathBuf {
        self.state_dir.join("daemon.lock")
    }

    #[must_use]
    pub fn poller_lock_path(&self) -> PathBuf {
        self.state_dir.join("poller.lock")
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("state_dir", &self.state_dir)
            .field("topics_path", &self.topics_path)
            .field("max_posts_per_run", &self.max_posts_per_run)
            .field("burst_cap", &self.burst_cap)
            .field("hourly_cap", &self.hourly_cap)
            .field("min_opportunity_score", &self.min_opportunity_score)
            .field("scan_window_hours", &self.scan_window_hours)
            .field("scan_limit", &self.scan_limit)
            .field("publish_delay_ms", &self.publish_delay_ms)
            .field("reciprocate_limit", &self.reciprocate_limit)
            .field("proactive_max_words", &self.proactive_max_words)
            .field("social_max_words", &self.social_max_words)
            .field("reply_max_words", &self.reply_max_words)
            .field("repoll_cooldown_hours", &self.repoll_cooldown_hours)
            .field("max_polls_per_run", &self.max_polls_per_run)
            .field("poll_delay_ms", &self.poll_delay_ms)
            .field("roi_grade_thresholds", &self.roi_grade_thresholds)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("daemon_cron", &self.daemon_cron)
            .field("poller_cron", &self.poller_cron)
            .field("community_api_key", &redact(&self.community_api_key))
            .field("community_base_url", &self.community_base_url)
            .field("community_watch_list", &self.community_watch_list)
            .field("composer_api_key", &redact(&self.composer_api_key))
            .field("composer_base_url", &self.composer_base_url)
            .field("composer_model", &self.composer_model)
            .field("github_token", &redact(&self.github_token))
            .field("github_repo", &self.github_repo)
            .field("github_self_login", &self.github_self_login)
            .field("slack_webhook_url", &redact(&self.slack_webhook_url))
            .field("ledger_spreadsheet_id", &self.ledger_spreadsheet_id)
            .field("ledger_access_token", &redact(&self.ledger_access_token))
            .field("ledger_base_url", &self.ledger_base_url)
            .finish()
    }
}
