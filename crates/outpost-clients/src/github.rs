//! GitHub client: watched-repository discussions, stargazers, and starring
//! back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::{HeaderMap, ACCEPT, LINK};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ClientError;
use crate::http::{build_client, check, join, json as read_json, parse_base};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::traits::{CommunityWatch, Reciprocation};
use crate::types::{Discussion, Follower};

const SERVICE: &str = "github";
const DEFAULT_BASE_URL: &str = "https://api.github.com";
const JSON_ACCEPT: &str = "application/vnd.github+json";
const STAR_ACCEPT: &str = "application/vnd.github.star+json";
const DISCUSSIONS_PAGE: u32 = 20;

const DISCUSSIONS_QUERY: &str = "query($owner: String!, $name: String!, $first: Int!) {
  repository(owner: $owner, name: $name) {
    discussions(first: $first, orderBy: {field: CREATED_AT, direction: DESC}) {
      nodes { id number title url createdAt author { login } }
    }
  }
}";

const ADD_COMMENT_MUTATION: &str = "mutation($id: ID!, $body: String!) {
  addDiscussionComment(input: {discussionId: $id, body: $body}) { comment { id } }
}";

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscussionNode {
    id: String,
    number: u64,
    title: String,
    url: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    author: Option<Actor>,
}

#[derive(Debug, Deserialize)]
struct Actor {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Stargazer {
    starred_at: DateTime<Utc>,
    user: Actor,
}

pub struct GithubClient {
    client: Client,
    base_url: Url,
    token: String,
    owner: String,
    repo: String,
    self_login: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url.as_str())
            .field("repo", &format!("{}/{}", self.owner, self.repo))
            .field("self_login", &self.self_login)
            .finish_non_exhaustive()
    }
}

/// How a maintainer should answer a new discussion, judged from its title.
fn host_action(title: &str) -> &'static str {
    let title = title.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| title.contains(w));
    if any(&["bug", "error", "broken", "fail", "crash"]) {
        "acknowledge the problem, ask for reproduction details, and point to the issue tracker"
    } else if any(&["idea", "feature", "request", "proposal"]) {
        "thank them for the idea and ask about the use case behind it"
    } else if any(&["show", "built", "made", "launch"]) {
        "celebrate what they built and ask what they plan next"
    } else if title.contains('?') || any(&["how", "why", "what", "help"]) {
        "answer the question directly and link the most relevant documentation"
    } else {
        "welcome them to the community and invite them to share more context"
    }
}

/// The `rel="last"` target of a pagination `Link` header.
fn last_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    let pattern = Regex::new(r#"<([^>]+)>;\s*rel="last""#).expect("valid link regex");
    pattern.captures(link).map(|c| c[1].to_string())
}

impl GithubClient {
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] if `repo` is not `owner/name`,
    /// or [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(
        token: &str,
        repo: &str,
        self_login: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        Self::with_base_url(
            token,
            repo,
            self_login,
            timeout_secs,
            user_agent,
            retry,
            DEFAULT_BASE_URL,
        )
    }

    /// Same as [`GithubClient::new`] against a custom API root (for testing
    /// with wiremock).
    ///
    /// # Errors
    ///
    /// See [`GithubClient::new`].
    pub fn with_base_url(
        token: &str,
        repo: &str,
        self_login: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
        base_url: &str,
    ) -> Result<Self, ClientError> {
        let (owner, name) = repo
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty() && !n.contains('/'))
            .ok_or_else(|| ClientError::InvalidConfig(format!("repo '{repo}' is not owner/name")))?;

        Ok(Self {
            client: build_client(timeout_secs, user_agent)?,
            base_url: parse_base(base_url)?,
            token: token.to_owned(),
            owner: owner.to_owned(),
            repo: name.to_owned(),
            self_login,
            retry,
        })
    }

    fn authed(&self, request: RequestBuilder, accept: &str) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, ClientError> {
        let url = join(&self.base_url, &["graphql"]);
        let payload = json!({ "query": query, "variables": variables });
        let response = self
            .authed(self.client.post(url), JSON_ACCEPT)
            .json(&payload)
            .send()
            .await?;
        let response = check(response, SERVICE).await?;
        let body: GraphQlResponse = read_json(response, "graphql").await?;

        if !body.errors.is_empty() {
            let message = body
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ClientError::Rejected {
                service: SERVICE,
                message,
            });
        }
        body.data.ok_or_else(|| ClientError::Rejected {
            service: SERVICE,
            message: "graphql response carried no data".to_string(),
        })
    }

    async fn stargazers_page(&self, url: Url) -> Result<(Vec<Stargazer>, Option<String>), ClientError> {
        retry_with_backoff(self.retry, SERVICE, || {
            let url = url.clone();
            async move {
                let response = self
                    .authed(self.client.get(url), STAR_ACCEPT)
                    .send()
                    .await?;
                let response = check(response, SERVICE).await?;
                let last = last_page(response.headers());
                let page: Vec<Stargazer> = read_json(response, "stargazers").await?;
                Ok((page, last))
            }
        })
        .await
    }

    /// GET returning whether the resource exists (2xx) or not (404).
    async fn exists(&self, url: Url) -> Result<bool, ClientError> {
        retry_with_backoff(self.retry, SERVICE, || {
            let url = url.clone();
            async move {
                let response = self
                    .authed(self.client.get(url), JSON_ACCEPT)
                    .send()
                    .await?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(false);
                }
                check(response, SERVICE).await.map(|_| true)
            }
        })
        .await
    }
}

#[async_trait]
impl CommunityWatch for GithubClient {
    async fn recent_discussions(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Discussion>, ClientError> {
        let variables = json!({
            "owner": self.owner,
            "name": self.repo,
            "first": DISCUSSIONS_PAGE,
        });
        let data = retry_with_backoff(self.retry, SERVICE, || {
            let variables = variables.clone();
            async move { self.graphql(DISCUSSIONS_QUERY, variables).await }
        })
        .await?;

        let nodes = data
            .pointer("/repository/discussions/nodes")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let nodes: Vec<DiscussionNode> =
            serde_json::from_value(nodes).map_err(|e| ClientError::Deserialize {
                context: "discussions".to_string(),
                source: e,
            })?;

        let discussions = nodes
            .into_iter()
            .filter(|n| n.created_at >= since)
            .filter_map(|n| {
                let author = n.author.map(|a| a.login)?;
                if self.self_login.as_deref() == Some(author.as_str()) {
                    return None;
                }
                Some(Discussion {
                    host_action: host_action(&n.title).to_string(),
                    id: n.id,
                    number: n.number,
                    title: n.title,
                    author,
                    url: n.url,
                    created_at: n.created_at,
                })
            })
            .collect();
        Ok(discussions)
    }

    /// Not retried: a comment that timed out may have been posted.
    async fn reply(&self, discussion: &Discussion, body: &str) -> Result<(), ClientError> {
        self.graphql(
            ADD_COMMENT_MUTATION,
            json!({ "id": discussion.id, "body": body }),
        )
        .await?;
        tracing::info!(discussion = discussion.number, "replied to discussion");
        Ok(())
    }
}

#[async_trait]
impl Reciprocation for GithubClient {
    async fn recent_followers(&self, since: DateTime<Utc>) -> Result<Vec<Follower>, ClientError> {
        let mut url = join(&self.base_url, &["repos", &self.owner, &self.repo, "stargazers"]);
        url.query_pairs_mut().append_pair("per_page", "100");

        // Stargazers are listed oldest first; the newest live on the last page.
        let (mut stars, last) = self.stargazers_page(url).await?;
        if let Some(last) = last {
            let last = Url::parse(&last)
                .map_err(|e| ClientError::InvalidConfig(format!("bad pagination link: {e}")))?;
            let (tail, _) = self.stargazers_page(last).await?;
            stars.extend(tail);
        }

        let mut followers: Vec<Follower> = stars
            .into_iter()
            .filter(|s| s.starred_at >= since)
            .map(|s| Follower {
                login: s.user.login,
                at: s.starred_at,
            })
            .collect();
        followers.sort_by(|a, b| b.at.cmp(&a.at));
        Ok(followers)
    }

    async fn has_reciprocation_target(&self, login: &str) -> Result<bool, ClientError> {
        let profile_repo = join(&self.base_url, &["repos", login, login]);
        if !self.exists(profile_repo).await? {
            return Ok(false);
        }
        let starred = join(&self.base_url, &["user", "starred", login, login]);
        Ok(!self.exists(starred).await?)
    }

    async fn reciprocate(&self, login: &str) -> Result<(), ClientError> {
        let url = join(&self.base_url, &["user", "starred", login, login]);
        let response = self
            .authed(self.client.put(url), JSON_ACCEPT)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;
        check(response, SERVICE).await?;
        tracing::info!(login, "starred profile repository");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn host_action_by_title() {
        assert!(host_action("Crash on startup").starts_with("acknowledge"));
        assert!(host_action("Feature request: webhooks").starts_with("thank"));
        assert!(host_action("Show: I built a dashboard").starts_with("celebrate"));
        assert!(host_action("Can it run offline?").starts_with("answer"));
        assert!(host_action("Hello everyone").starts_with("welcome"));
    }

    #[test]
    fn last_page_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/repos/o/r/stargazers?page=2>; rel=\"next\", \
                 <https://api.github.com/repos/o/r/stargazers?page=7>; rel=\"last\"",
            ),
        );
        assert_eq!(
            last_page(&headers).as_deref(),
            Some("https://api.github.com/repos/o/r/stargazers?page=7")
        );
        assert_eq!(last_page(&HeaderMap::new()), None);
    }

    #[test]
    fn repo_must_be_owner_slash_name() {
        for bad in ["noslash", "/name", "owner/", "a/b/c"] {
            let err = GithubClient::new("t", bad, None, 5, "ua", RetryPolicy::none()).unwrap_err();
            assert!(matches!(err, ClientError::InvalidConfig(_)), "{bad}");
        }
    }
}
