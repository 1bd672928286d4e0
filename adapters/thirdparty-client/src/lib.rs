//! thirdparty-client — outbound call to the unrelated "thirdparty" service.
//!
//! Purpose
//! - Issue a single `GET <base_url>external` and return the body as text.
//! - Surface every failure (transport, timeout, non-2xx) to the caller; there
//!   is no retry and no fallback value. Whether a failure matters is decided
//!   by the caller.
//!
//! Notes
//! - One `reqwest::Client` is built up front and reused across calls.
//! - No timeout is applied unless `ClientConfig::timeout` is set.

use std::time::Duration;
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "http://thirdparty-service/";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("upstream returned status {0}")]
    Status(u16),
}

impl ClientError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if let Some(status) = e.status() {
            ClientError::Status(status.as_u16())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThirdPartyClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ThirdPartyClient {
    pub fn new(cfg: ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = cfg.timeout {
            builder = builder.timeout(t);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: external_url(&cfg.base_url),
        })
    }

    /// Fetch the upstream body. Awaits until the response completes or the
    /// transport fails.
    pub async fn get_external_service(&self) -> Result<String, ClientError> {
        info!(endpoint = %self.endpoint, "calling thirdparty service");
        let resp = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        let body = resp.text().await.map_err(ClientError::from_reqwest)?;
        info!(endpoint = %self.endpoint, bytes = body.len(), "thirdparty service answered");
        Ok(body)
    }
}

fn external_url(base_url: &str) -> String {
    if base_url.ends_with('/') {
        format!("{base_url}external")
    } else {
        format!("{base_url}/external")
    }
}
