//! Shared configuration, domain records, and scoring rules for the outpost
//! posting daemon and the engagement reconciliation poller.

pub mod app_config;
pub mod clock;
pub mod config;
pub mod failure;
pub mod records;
pub mod roi;
pub mod topics;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, GradeThreshold};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use failure::{FailureKind, RunFailure};
pub use records::{
    CommunityAggregate, DailyReport, ForecastWeek, LedgerRow, PerformanceRecord, PublishEvent,
    RelationshipNote,
};
pub use roi::{grade_for, roi_score, DEFAULT_GRADE_THRESHOLDS};
pub use topics::{
    load_topics, ContentKind, Drafting, Strategy, Topic, TopicRotation, TopicSlot, TopicsFile,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read topics file {path}: {source}")]
    TopicsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse topics file: {0}")]
    TopicsFileParse(#[source] serde_yaml::Error),

    #[error("topics validation failed: {0}")]
    Validation(String),
}
