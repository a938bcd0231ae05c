//! Draft generation through an OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::http::{build_client, check, join, json as read_json, parse_base};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::traits::Composer;
use crate::types::{ComposeRequest, Draft};

const SERVICE: &str = "composer";
/// Token headroom per requested word.
const TOKENS_PER_WORD: u32 = 2;
const MIN_MAX_TOKENS: u32 = 256;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ComposerClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ComposerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposerClient")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

fn system_prompt(request: &ComposeRequest) -> String {
    let tone = request.tone.as_deref().unwrap_or("professional-warm");
    format!(
        "You write posts for {platform}. Audience: {audience}. Tone: {tone}. \
         Write at most {max_words} words. Output only the post text, with no \
         preamble, no title and no surrounding quotes.",
        platform = request.platform,
        audience = request.audience,
        max_words = request.max_words,
    )
}

fn user_prompt(request: &ComposeRequest) -> String {
    match request.context.as_deref().map(str::trim) {
        Some(context) if !context.is_empty() => {
            format!("Goal: {}\n\nContext:\n{context}", request.goal)
        }
        _ => format!("Goal: {}", request.goal),
    }
}

impl ComposerClient {
    /// # Errors
    ///
    /// Returns [`ClientError`] if the HTTP client cannot be built or
    /// `base_url` is invalid.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            base_url: parse_base(base_url)?,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            retry,
        })
    }
}

#[async_trait]
impl Composer for ComposerClient {
    async fn compose(&self, request: &ComposeRequest) -> Result<Draft, ClientError> {
        let url = join(&self.base_url, &["chat", "completions"]);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(request),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(request),
                },
            ],
            max_tokens: request
                .max_words
                .saturating_mul(TOKENS_PER_WORD)
                .max(MIN_MAX_TOKENS),
        };

        let response: ChatResponse = retry_with_backoff(self.retry, SERVICE, || {
            let url = url.clone();
            let body = &body;
            async move {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.api_key)
                    .json(body)
                    .send()
                    .await?;
                let response = check(response, SERVICE).await?;
                read_json(response, "chat completion").await
            }
        })
        .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: "completion contained no text".to_string(),
            });
        }

        tracing::debug!(words = text.split_whitespace().count(), "draft composed");
        Ok(Draft {
            text,
            model: response.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(context: Option<&str>) -> ComposeRequest {
        ComposeRequest {
            goal: "explain settlement risk".into(),
            platform: "community".into(),
            audience: "agent builders".into(),
            context: context.map(str::to_string),
            tone: Some("witty-casual".into()),
            max_words: 120,
        }
    }

    #[test]
    fn system_prompt_carries_limits_and_tone() {
        let prompt = system_prompt(&request(None));
        assert!(prompt.contains("at most 120 words"));
        assert!(prompt.contains("witty-casual"));
        assert!(prompt.contains("agent builders"));
    }

    #[test]
    fn blank_context_is_omitted() {
        assert_eq!(user_prompt(&request(Some("  "))), "Goal: explain settlement risk");
        assert!(user_prompt(&request(Some("thread about T+1"))).contains("Context:\nthread"));
    }
}
