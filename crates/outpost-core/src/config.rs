use std::env::VarError;
use std::path::PathBuf;
use std::str::FromStr;

use crate::app_config::{AppConfig, Environment, GradeThreshold};
use crate::ConfigError;

/// Longest look-back accepted for hour-valued settings (one year).
pub const MAX_WINDOW_HOURS: u32 = 24 * 366;

const DEFAULT_WATCH_LIST: &str = "agents,agentfinance,finance,mcp,aitools,crypto,defi,coding";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn parse_or<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_hours<F>(lookup: &F, var: &str, default: &str) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let hours: u32 = parse_or(lookup, var, default)?;
    if hours > MAX_WINDOW_HOURS {
        return Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("{hours} exceeds the maximum of {MAX_WINDOW_HOURS} hours"),
        });
    }
    Ok(hours)
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can feed a `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let env = parse_environment(&or_default("OUTPOST_ENV", "development"))?;
    let log_level = or_default("OUTPOST_LOG_LEVEL", "info");
    let state_dir = PathBuf::from(or_default("OUTPOST_STATE_DIR", "./state"));
    let topics_path = PathBuf::from(or_default("OUTPOST_TOPICS_PATH", "./config/topics.yaml"));

    let max_posts_per_run = parse_or(&lookup, "OUTPOST_MAX_POSTS_PER_RUN", "4")?;
    let burst_cap = parse_or(&lookup, "OUTPOST_BURST_CAP", "4")?;
    let hourly_cap = parse_or(&lookup, "OUTPOST_HOURLY_CAP", "10")?;
    let min_opportunity_score = parse_or(&lookup, "OUTPOST_MIN_OPPORTUNITY_SCORE", "15")?;
    let scan_window_hours = parse_hours(&lookup, "OUTPOST_SCAN_WINDOW_HOURS", "1")?;
    let scan_limit = parse_or(&lookup, "OUTPOST_SCAN_LIMIT", "5")?;
    let publish_delay_ms = parse_or(&lookup, "OUTPOST_PUBLISH_DELAY_MS", "3000")?;
    let reciprocate_limit = parse_or(&lookup, "OUTPOST_RECIPROCATE_LIMIT", "2")?;
    let proactive_max_words = parse_or(&lookup, "OUTPOST_PROACTIVE_MAX_WORDS", "400")?;
    let social_max_words = parse_or(&lookup, "OUTPOST_SOCIAL_MAX_WORDS", "200")?;
    let reply_max_words = parse_or(&lookup, "OUTPOST_REPLY_MAX_WORDS", "120")?;

    let repoll_cooldown_hours = parse_hours(&lookup, "OUTPOST_REPOLL_COOLDOWN_HOURS", "2")?;
    let max_polls_per_run = parse_or(&lookup, "OUTPOST_MAX_POLLS_PER_RUN", "60")?;
    let poll_delay_ms = parse_or(&lookup, "OUTPOST_POLL_DELAY_MS", "300")?;
    let roi_grade_thresholds = parse_grade_thresholds(&or_default(
        "OUTPOST_ROI_GRADE_THRESHOLDS",
        "5.0:A,2.0:B,0.5:C,0.0:D",
    ))?;

    let request_timeout_secs = parse_or(&lookup, "OUTPOST_REQUEST_TIMEOUT_SECS", "20")?;
    let user_agent = or_default("OUTPOST_USER_AGENT", "outpost/0.1 (engagement-daemon)");
    let max_retries = parse_or(&lookup, "OUTPOST_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_or(&lookup, "OUTPOST_RETRY_BACKOFF_BASE_MS", "500")?;

    let daemon_cron = or_default("OUTPOST_DAEMON_CRON", "0 */30 * * * *");
    let poller_cron = or_default("OUTPOST_POLLER_CRON", "0 0 */2 * * *");

    let community_watch_list =
        parse_list(&or_default("COMMUNITY_WATCH_LIST", DEFAULT_WATCH_LIST));

    let github_repo = optional("GITHUB_REPO");
    if let Some(repo) = &github_repo {
        validate_repo_slug(repo)?;
    }

    Ok(AppConfig {
        env,
        log_level,
        state_dir,
        topics_path,
        max_posts_per_run,
        burst_cap,
        hourly_cap,
        min_opportunity_score,
        scan_window_hours,
        scan_limit,
        publish_delay_ms,
        reciprocate_limit,
        proactive_max_words,
        social_max_words,
        reply_max_words,
        repoll_cooldown_hours,
        max_polls_per_run,
        poll_delay_ms,
        roi_grade_thresholds,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        daemon_cron,
        poller_cron,
        community_api_key: optional("COMMUNITY_API_KEY"),
        community_base_url: or_default("COMMUNITY_BASE_URL", "https://www.moltbook.com"),
        community_watch_list,
        composer_api_key: optional("COMPOSER_API_KEY"),
        composer_base_url: or_default("COMPOSER_BASE_URL", "https://openrouter.ai/api/v1"),
        composer_model: or_default("COMPOSER_MODEL", "google/gemini-2.0-flash-lite-001"),
        github_token: optional("GITHUB_TOKEN"),
        github_repo,
        github_self_login: optional("GITHUB_SELF_LOGIN"),
        slack_webhook_url: optional("SLACK_WEBHOOK_URL"),
        ledger_spreadsheet_id: optional("LEDGER_SPREADSHEET_ID"),
        ledger_access_token: optional("LEDGER_ACCESS_TOKEN"),
        ledger_base_url: or_default("LEDGER_BASE_URL", "https://sheets.googleapis.com"),
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "OUTPOST_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Parse `"5.0:A,2.0:B"` into a descending grade ladder.
fn parse_grade_thresholds(raw: &str) -> Result<Vec<GradeThreshold>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        var: "OUTPOST_ROI_GRADE_THRESHOLDS".to_string(),
        reason,
    };

    let mut ladder = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (threshold, grade) = entry
            .split_once(':')
            .ok_or_else(|| invalid(format!("expected 'threshold:grade', got '{entry}'")))?;
        let min_avg_upvotes = threshold
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid(format!("'{threshold}': {e}")))?;
        if !min_avg_upvotes.is_finite() {
            return Err(invalid(format!("threshold '{threshold}' is not finite")));
        }
        let grade = grade.trim();
        if grade.is_empty() {
            return Err(invalid(format!("empty grade in '{entry}'")));
        }
        ladder.push(GradeThreshold {
            min_avg_upvotes,
            grade: grade.to_string(),
        });
    }

    if ladder.is_empty() {
        return Err(invalid("at least one threshold is required".to_string()));
    }

    ladder.sort_by(|a, b| b.min_avg_upvotes.total_cmp(&a.min_avg_upvotes));
    Ok(ladder)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_repo_slug(repo: &str) -> Result<(), ConfigError> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(ConfigError::InvalidEnvVar {
            var: "GITHUB_REPO".to_string(),
            reason: format!("expected 'owner/name', got '{repo}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
