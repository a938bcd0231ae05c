//! Startup wiring: which collaborator capabilities this process has.
//!
//! Every capability is optional. A missing credential leaves its slot empty
//! and the stage that needs it is skipped at run time.

use std::sync::Arc;

use outpost_core::AppConfig;
use outpost_ledger::Ledger;

use crate::community::CommunityClient;
use crate::composer::ComposerClient;
use crate::error::ClientError;
use crate::github::GithubClient;
use crate::retry::RetryPolicy;
use crate::slack::SlackNotifier;
use crate::traits::{
    CommunityWatch, Composer, MetricsSource, Notifier, Publisher, Reciprocation, RelationshipLog,
    Scanner,
};

#[derive(Clone, Default)]
pub struct Collaborators {
    pub scanner: Option<Arc<dyn Scanner>>,
    pub composer: Option<Arc<dyn Composer>>,
    pub publisher: Option<Arc<dyn Publisher>>,
    pub metrics: Option<Arc<dyn MetricsSource>>,
    pub community_watch: Option<Arc<dyn CommunityWatch>>,
    pub reciprocation: Option<Arc<dyn Reciprocation>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub relationships: Option<Arc<dyn RelationshipLog>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("scanner", &self.scanner.is_some())
            .field("composer", &self.composer.is_some())
            .field("publisher", &self.publisher.is_some())
            .field("metrics", &self.metrics.is_some())
            .field("community_watch", &self.community_watch.is_some())
            .field("reciprocation", &self.reciprocation.is_some())
            .field("notifier", &self.notifier.is_some())
            .field("relationships", &self.relationships.is_some())
            .finish()
    }
}

impl Collaborators {
    /// Build every capability whose credentials are present in `config`.
    /// The ledger, when given, backs the relationship log.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if a configured client cannot be constructed
    /// (bad base URL, malformed repository slug).
    pub fn from_config(config: &AppConfig, ledger: Option<Ledger>) -> Result<Self, ClientError> {
        let retry = RetryPolicy::new(config.max_retries, config.retry_backoff_base_ms);
        let timeout = config.request_timeout_secs;
        let ua = config.user_agent.as_str();
        let mut collaborators = Self::default();

        if let Some(key) = &config.community_api_key {
            let community = Arc::new(CommunityClient::new(
                key,
                &config.community_base_url,
                config.community_watch_list.clone(),
                timeout,
                ua,
                retry,
            )?);
            collaborators.scanner = Some(community.clone());
            collaborators.publisher = Some(community.clone());
            collaborators.metrics = Some(community);
        }

        if let Some(key) = &config.composer_api_key {
            collaborators.composer = Some(Arc::new(ComposerClient::new(
                key,
                &config.composer_base_url,
                &config.composer_model,
                timeout,
                ua,
                retry,
            )?));
        }

        if let (Some(token), Some(repo)) = (&config.github_token, &config.github_repo) {
            let github = Arc::new(GithubClient::new(
                token,
                repo,
                config.github_self_login.clone(),
                timeout,
                ua,
                retry,
            )?);
            collaborators.community_watch = Some(github.clone());
            collaborators.reciprocation = Some(github);
        }

        if let Some(webhook) = &config.slack_webhook_url {
            collaborators.notifier = Some(Arc::new(SlackNotifier::new(webhook, timeout, ua)?));
        }

        if let Some(ledger) = ledger {
            collaborators.relationships = Some(Arc::new(ledger));
        }

        tracing::info!(collaborators = ?collaborators, "collaborators configured");
        Ok(collaborators)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        outpost_core::build_app_config(|key| map.get(key).cloned().ok_or(VarError::NotPresent))
            .unwrap()
    }

    #[test]
    fn nothing_configured_leaves_every_slot_empty() {
        let c = Collaborators::from_config(&config(&[]), None).unwrap();
        assert!(c.scanner.is_none());
        assert!(c.composer.is_none());
        assert!(c.publisher.is_none());
        assert!(c.metrics.is_none());
        assert!(c.community_watch.is_none());
        assert!(c.reciprocation.is_none());
        assert!(c.notifier.is_none());
        assert!(c.relationships.is_none());
    }

    #[test]
    fn community_key_enables_scan_publish_and_metrics() {
        let c = Collaborators::from_config(&config(&[("COMMUNITY_API_KEY", "k")]), None).unwrap();
        assert!(c.scanner.is_some());
        assert!(c.publisher.is_some());
        assert!(c.metrics.is_some());
        assert!(c.composer.is_none());
    }

    #[test]
    fn github_needs_token_and_repo() {
        let only_token = config(&[("GITHUB_TOKEN", "t")]);
        assert!(Collaborators::from_config(&only_token, None)
            .unwrap()
            .community_watch
            .is_none());

        let both = config(&[("GITHUB_TOKEN", "t"), ("GITHUB_REPO", "acme/outpost")]);
        let c = Collaborators::from_config(&both, None).unwrap();
        assert!(c.community_watch.is_some());
        assert!(c.reciprocation.is_some());
    }

    #[test]
    fn ledger_backs_relationship_log() {
        let store = Arc::new(outpost_ledger::MemoryRecordStore::new());
        let ledger = Ledger::new(store, outpost_ledger::LedgerViews::default());
        let c = Collaborators::from_config(&config(&[]), Some(ledger)).unwrap();
        assert!(c.relationships.is_some());
    }
}
