//! HTTP client for the community platform: feed scanning, publishing with
//! verification, and per-post metrics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::challenge;
use crate::error::ClientError;
use crate::http::{build_client, check, join, json as read_json, parse_base};
use crate::relevance;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::traits::{MetricsSource, Publisher, Scanner};
use crate::types::{Opportunity, PostMetrics, Publication, ScanRequest};

const SERVICE: &str = "community";
const MAX_OPPORTUNITIES: usize = 20;
const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    post: Option<PublishedPost>,
}

#[derive(Debug, Deserialize)]
struct PublishedPost {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    verification: Option<Verification>,
}

#[derive(Debug, Deserialize)]
struct Verification {
    #[serde(default)]
    verification_code: String,
    #[serde(default)]
    challenge_text: String,
}

pub struct CommunityClient {
    client: Client,
    base_url: Url,
    api_key: String,
    watch_list: Vec<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for CommunityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommunityClient")
            .field("base_url", &self.base_url.as_str())
            .field("watch_list", &self.watch_list)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Text of the first present key, for APIs that rename fields between versions.
fn text_field(item: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| match item.get(*k) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Object(o)) => ["name", "username", "login"]
                .iter()
                .find_map(|nk| o.get(*nk).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        })
        .unwrap_or_default()
}

fn count_field(item: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .find_map(|k| {
            let v = item.get(*k)?;
            v.as_u64()
                .or_else(|| v.as_array().map(|a| a.len() as u64))
        })
        .unwrap_or(0)
}

fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Posts come back either bare, or under `posts` or `data`.
fn post_list(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => ["posts", "data"]
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn created_at(post: &Value) -> Option<DateTime<Utc>> {
    let raw = text_field(post, &["created_at", "createdAt", "created"]);
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl CommunityClient {
    /// # Errors
    ///
    /// Returns [`ClientError`] if the HTTP client cannot be built or
    /// `base_url` is invalid.
    pub fn new(
        api_key: &str,
        base_url: &str,
        watch_list: Vec<String>,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            base_url: parse_base(base_url)?,
            api_key: api_key.to_owned(),
            watch_list,
            retry,
        })
    }

    fn post_url(&self, community: &str, post_id: &str) -> String {
        join(&self.base_url, &["m", community, "posts", post_id]).to_string()
    }

    async fn community_posts(&self, community: &str, limit: usize) -> Result<Vec<Value>, ClientError> {
        let mut url = join(&self.base_url, &["api", "v1", "submolts", community, "posts"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("sort", "new");

        let body: Value = retry_with_backoff(self.retry, SERVICE, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(url)
                    .bearer_auth(&self.api_key)
                    .send()
                    .await?;
                let response = check(response, SERVICE).await?;
                read_json(response, &format!("posts({community})")).await
            }
        })
        .await?;
        Ok(post_list(body))
    }

    fn opportunity(community: &str, post: &Value, since: DateTime<Utc>) -> Option<Opportunity> {
        if created_at(post).is_some_and(|at| at < since) {
            return None;
        }
        let title = text_field(post, &["title"]);
        let body = text_field(post, &["content", "body"]);
        let upvotes = count_field(post, &["upvotes", "likes", "score"]);
        let comments = count_field(post, &["comment_count", "comments_count", "comments"]);
        let eval = relevance::evaluate(&title, &body, upvotes, comments);

        let author = Some(text_field(post, &["author", "user"]))
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        Some(Opportunity {
            community: community.to_string(),
            post_id: text_field(post, &["id"]),
            title: title.chars().take(MAX_TITLE_CHARS).collect(),
            author,
            angle: eval.angle.to_string(),
            score: eval.score,
        })
    }

    async fn verify(&self, verification: &Verification) -> bool {
        let Some(answer) = challenge::solve(&verification.challenge_text) else {
            tracing::warn!(
                challenge = %verification.challenge_text,
                "verification challenge has no numbers; leaving post unverified"
            );
            return false;
        };

        let url = join(&self.base_url, &["api", "v1", "verify"]);
        let result = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "verification_code": verification.verification_code,
                "answer": answer,
            }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("success").and_then(Value::as_bool))
                .unwrap_or(false),
            Ok(response) => {
                tracing::warn!(status = %response.status(), %answer, "verification rejected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "verification request failed");
                false
            }
        }
    }
}

#[async_trait]
impl Scanner for CommunityClient {
    async fn scan(&self, request: &ScanRequest) -> Result<Vec<Opportunity>, ClientError> {
        let mut opportunities = Vec::new();
        let mut last_error = None;
        let mut reachable = 0usize;

        for community in &self.watch_list {
            match self.community_posts(community, request.limit).await {
                Ok(posts) => {
                    reachable += 1;
                    opportunities.extend(
                        posts
                            .iter()
                            .filter_map(|p| Self::opportunity(community, p, request.since))
                            .filter(|o| o.score >= request.min_score),
                    );
                }
                Err(ClientError::NotFound(_)) => {
                    reachable += 1;
                    tracing::debug!(community = %community, "watched community does not exist");
                }
                Err(e) => {
                    tracing::warn!(community = %community, error = %e, "community scan failed");
                    last_error = Some(e);
                }
            }
        }

        if reachable == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        opportunities.sort_by(|a, b| b.score.cmp(&a.score));
        opportunities.truncate(MAX_OPPORTUNITIES);
        Ok(opportunities)
    }
}

#[async_trait]
impl Publisher for CommunityClient {
    /// Not retried: a create that timed out may still have landed.
    async fn publish(
        &self,
        community: &str,
        title: &str,
        content: &str,
    ) -> Result<Publication, ClientError> {
        let (community, title, content) = (community.trim(), title.trim(), content.trim());
        if community.is_empty() || title.is_empty() || content.is_empty() {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: "community, title and content must be non-empty".to_string(),
            });
        }

        let url = join(&self.base_url, &["api", "v1", "posts"]);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "submolt_name": community,
                "title": title,
                "content": content,
            }))
            .send()
            .await?;
        let response = check(response, SERVICE).await?;
        let body: PublishResponse = read_json(response, "publish").await?;

        if !body.success {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: body.error.unwrap_or_else(|| "success=false".to_string()),
            });
        }
        let post = body.post.ok_or_else(|| ClientError::Rejected {
            service: SERVICE,
            message: "response carried no post".to_string(),
        })?;
        let post_id = id_text(&post.id);
        if post_id.is_empty() {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: "response carried no post id".to_string(),
            });
        }

        let verified = match &post.verification {
            Some(v) if !v.verification_code.is_empty() && !v.challenge_text.is_empty() => {
                self.verify(v).await
            }
            _ => false,
        };

        Ok(Publication {
            url: self.post_url(community, &post_id),
            post_id,
            verified,
        })
    }
}

#[async_trait]
impl MetricsSource for CommunityClient {
    async fn fetch(&self, post_id: &str) -> Result<PostMetrics, ClientError> {
        let url = join(&self.base_url, &["api", "v1", "posts", post_id]);
        let body: Value = retry_with_backoff(self.retry, SERVICE, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(url)
                    .bearer_auth(&self.api_key)
                    .send()
                    .await?;
                let response = check(response, SERVICE)
                    .await
                    .map_err(|e| match e {
                        ClientError::NotFound(_) => ClientError::NotFound(post_id.to_string()),
                        other => other,
                    })?;
                read_json(response, &format!("post({post_id})")).await
            }
        })
        .await?;

        let post = body.get("post").filter(|p| p.is_object()).unwrap_or(&body);
        Ok(PostMetrics {
            upvotes: count_field(post, &["upvotes", "score"]),
            comments: count_field(post, &["comments_count", "num_comments", "comment_count"]),
            community: text_field(post, &["submolt", "community"]),
            title: text_field(post, &["title"]),
        })
    }
}
