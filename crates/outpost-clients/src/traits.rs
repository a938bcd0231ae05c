//! Capability traits the drivers depend on. Each is optional at runtime;
//! see [`crate::Collaborators`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outpost_core::RelationshipNote;

use crate::error::ClientError;
use crate::types::{
    ComposeRequest, Discussion, Draft, Follower, Opportunity, PostMetrics, Publication,
    ScanRequest,
};

/// Ranked engagement opportunities from the community feed.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Opportunities scoring at least `min_score`, highest first.
    async fn scan(&self, request: &ScanRequest) -> Result<Vec<Opportunity>, ClientError>;
}

#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(&self, request: &ComposeRequest) -> Result<Draft, ClientError>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        community: &str,
        title: &str,
        content: &str,
    ) -> Result<Publication, ClientError>;
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Current engagement for `post_id`, or [`ClientError::NotFound`].
    async fn fetch(&self, post_id: &str) -> Result<PostMetrics, ClientError>;
}

/// Inbound discussions the daemon can welcome.
#[async_trait]
pub trait CommunityWatch: Send + Sync {
    async fn recent_discussions(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Discussion>, ClientError>;

    async fn reply(&self, discussion: &Discussion, body: &str) -> Result<(), ClientError>;
}

/// Inbound positive signals and the matching reciprocal action.
#[async_trait]
pub trait Reciprocation: Send + Sync {
    async fn recent_followers(&self, since: DateTime<Utc>) -> Result<Vec<Follower>, ClientError>;

    /// Whether `login` has something to reciprocate on that we have not
    /// already acted on.
    async fn has_reciprocation_target(&self, login: &str) -> Result<bool, ClientError>;

    async fn reciprocate(&self, login: &str) -> Result<(), ClientError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), ClientError>;
}

#[async_trait]
pub trait RelationshipLog: Send + Sync {
    async fn note(&self, note: &RelationshipNote) -> Result<(), ClientError>;
}
