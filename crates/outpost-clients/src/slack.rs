//! Incoming-webhook notifier.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::json;

use crate::error::ClientError;
use crate::http::{build_client, check, parse_base};
use crate::traits::Notifier;

const SERVICE: &str = "slack";

pub struct SlackNotifier {
    client: Client,
    webhook_url: Url,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("webhook_url", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl SlackNotifier {
    /// # Errors
    ///
    /// Returns [`ClientError`] if the client cannot be built or the webhook
    /// URL is invalid.
    pub fn new(webhook_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            webhook_url: parse_base(webhook_url)?,
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "text": message }))
            .send()
            .await?;
        check(response, SERVICE).await?;
        Ok(())
    }
}
