//! Failure taxonomy shared by both drivers and persisted in poller state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A collaborator could not be reached or is not configured.
    CollaboratorUnavailable,
    /// The rate limiter denied further publishing.
    RateLimited,
    /// The metrics source has no record for an id.
    ItemNotFound,
    /// A batched record-store write failed.
    PartialWriteFailure,
    /// A row carried an unparseable date or number.
    MalformedInput,
    /// The record-store client could not authenticate.
    AuthenticationFailed,
    /// A required view could not be read.
    ReadFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::CollaboratorUnavailable => "collaborator_unavailable",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ItemNotFound => "item_not_found",
            FailureKind::PartialWriteFailure => "partial_write_failure",
            FailureKind::MalformedInput => "malformed_input",
            FailureKind::AuthenticationFailed => "authentication_failed",
            FailureKind::ReadFailure => "read_failure",
        };
        f.write_str(name)
    }
}

/// One recorded failure from a run, with enough context to reconstruct it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub message: String,
}

impl RunFailure {
    #[must_use]
    pub fn new(kind: FailureKind, stage: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: stage.to_string(),
            post_id: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn for_post(mut self, post_id: &str) -> Self {
        self.post_id = Some(post_id.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_as_snake_case_and_omits_missing_post() {
        let failure = RunFailure::new(FailureKind::PartialWriteFailure, "upsert", "boom");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "partial_write_failure");
        assert!(json.get("post_id").is_none());
    }

    #[test]
    fn display_matches_serialized_name() {
        let json = serde_json::to_value(FailureKind::ItemNotFound).unwrap();
        assert_eq!(json, FailureKind::ItemNotFound.to_string());
    }
}
