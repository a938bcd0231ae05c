//! Collaborator capabilities consumed by the drivers, their HTTP
//! implementations, and the startup registry that wires them from config.

pub mod challenge;
pub mod community;
pub mod composer;
pub mod error;
pub mod github;
pub(crate) mod http;
pub mod ledger_log;
pub mod registry;
pub mod relevance;
pub mod retry;
pub mod slack;
pub mod traits;
pub mod types;

pub use community::CommunityClient;
pub use composer::ComposerClient;
pub use error::ClientError;
pub use github::GithubClient;
pub use registry::Collaborators;
pub use retry::RetryPolicy;
pub use slack::SlackNotifier;
pub use traits::{
    CommunityWatch, Composer, MetricsSource, Notifier, Publisher, Reciprocation,
    RelationshipLog, Scanner,
};
pub use types::{
    ComposeRequest, Discussion, Draft, Follower, Opportunity, PostMetrics, Publication,
    ScanRequest,
};
