//! HTTP client for the store backend REST service.

use std::time::Duration;

use cartwright_config::BackendConfig;
use reqwest::{Method, Url};

/// Why a backend call produced no usable reply.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid JSON in backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid path segment '{0}'")]
    InvalidSegment(String),

    #[error("invalid backend URL '{0}'")]
    InvalidBaseUrl(String),
}

/// A backend reply: status plus raw body.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn json(&self) -> Result<serde_json::Value, BackendError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Client for the backend REST contract.
///
/// Non-2xx statuses are returned as [`Reply`] values for the caller to
/// map; only transport failures are errors.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    auth_timeout: Duration,
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_timeout: Duration::from_secs(config.auth_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Timeout for the session validation endpoint.
    pub fn auth_timeout(&self) -> Duration {
        self.auth_timeout
    }

    /// Timeout for profile and cart endpoints.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub async fn get(&self, segments: &[&str], timeout: Duration) -> Result<Reply, BackendError> {
        self.send(Method::GET, segments, None, timeout).await
    }

    pub async fn post(&self, segments: &[&str], body: &serde_json::Value) -> Result<Reply, BackendError> {
        self.send(Method::POST, segments, Some(body), self.request_timeout).await
    }

    pub async fn put(&self, segments: &[&str], body: &serde_json::Value) -> Result<Reply, BackendError> {
        self.send(Method::PUT, segments, Some(body), self.request_timeout).await
    }

    pub async fn patch(&self, segments: &[&str], body: &serde_json::Value) -> Result<Reply, BackendError> {
        self.send(Method::PATCH, segments, Some(body), self.request_timeout).await
    }

    pub async fn delete(&self, segments: &[&str]) -> Result<Reply, BackendError> {
        self.send(Method::DELETE, segments, None, self.request_timeout).await
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    ///
    /// Ids come from the model, so a segment can never add path levels,
    /// a query string or a parent reference.
    pub fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(BackendError::InvalidSegment(bad.to_string()));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|_| BackendError::InvalidBaseUrl(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidBaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<Reply, BackendError> {
        let url = self.url(segments)?;
        tracing::debug!(method = %method, url = %url, "Calling backend");

        let mut request = self.client.request(method, url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let timed_out = |e: reqwest::Error| {
            if e.is_timeout() {
                BackendError::Timeout(timeout)
            } else {
                BackendError::Transport(e)
            }
        };

        let response = request.send().await.map_err(timed_out)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(timed_out)?;
        Ok(Reply { status, body })
    }
}
