//! Values exchanged with collaborators.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Only items created at or after this instant are considered.
    pub since: DateTime<Utc>,
    pub min_score: u32,
    /// Items fetched per watched community.
    pub limit: usize,
}

/// A candidate item to react to, ranked by `score`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opportunity {
    pub community: String,
    pub post_id: String,
    pub title: String,
    pub author: String,
    /// Suggested engagement angle, used as the composer goal.
    pub angle: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRequest {
    pub goal: String,
    pub platform: String,
    pub audience: String,
    pub context: Option<String>,
    pub tone: Option<String>,
    pub max_words: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    pub model: String,
}

impl Draft {
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub post_id: String,
    pub url: String,
    /// Whether the platform's verification challenge was answered correctly.
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMetrics {
    pub upvotes: u64,
    pub comments: u64,
    pub community: String,
    pub title: String,
}

/// A new inbound discussion on the watched repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discussion {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    /// How a host should respond, used as the composer goal.
    pub host_action: String,
}

/// Someone who starred or followed the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Follower {
    pub login: String,
    pub at: DateTime<Utc>,
}
