//! Shared `reqwest` plumbing for the collaborator clients.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::ClientError;

const MAX_ERROR_BODY: usize = 500;

pub(crate) fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, ClientError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?)
}

/// Parse a base URL, dropping any trailing slash so paths can be appended.
pub(crate) fn parse_base(base_url: &str) -> Result<Url, ClientError> {
    Url::parse(base_url.trim_end_matches('/'))
        .map_err(|e| ClientError::InvalidConfig(format!("invalid base URL '{base_url}': {e}")))
}

/// Append path segments (each percent-encoded) to `base`.
pub(crate) fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Pass 2xx through; map 404 to [`ClientError::NotFound`] and anything else
/// to [`ClientError::Status`].
pub(crate) async fn check(
    response: Response,
    service: &'static str,
) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let mut body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(url));
    }
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    Err(ClientError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn json<T: DeserializeOwned>(
    response: Response,
    context: &str,
) -> Result<T, ClientError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}
