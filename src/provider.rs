//! Limitless API client and rate-limit-aware fetcher.
//!
//! [`LimitlessClient`] issues the authenticated GET requests; [`Fetcher`]
//! wraps any [`TranscriptSource`] with the bounded retry-on-429 policy so
//! the orchestrator never talks to the HTTP layer directly.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{AuthScheme, Config};

/// Total attempts per date when the provider keeps answering 429.
const MAX_ATTEMPTS: u32 = 3;

/// Errors that can occur while fetching from the provider
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by provider (HTTP 429)")]
    RateLimited,

    #[error("Provider returned status {0}")]
    Status(StatusCode),

    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

/// A source of daily transcript payloads.
///
/// `Ok(None)` means "no data for this date" (empty payload or 404), which
/// callers treat differently from a transport error.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<Option<Value>, FetchError>;
}

/// HTTP client for the Limitless lifelogs endpoint
pub struct LimitlessClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    auth: AuthScheme,
    timeout: Duration,
}

impl LimitlessClient {
    /// Create a client from the resolved configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            auth: config.auth,
            timeout: config.request_timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/lifelogs", self.base_url)
    }
}

#[async_trait]
impl TranscriptSource for LimitlessClient {
    async fn fetch(&self, date: NaiveDate) -> Result<Option<Value>, FetchError> {
        let url = self.endpoint();
        debug!(%date, %url, "Fetching lifelogs");

        let mut request = self
            .client
            .get(&url)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .timeout(self.timeout);

        request = match self.auth {
            AuthScheme::ApiKey => request.header("X-API-Key", &self.api_key),
            AuthScheme::Bearer => request.bearer_auth(&self.api_key),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::OK => {
                let body: Value = response
                    .json()
                    .await
                    .map_err(|e| FetchError::Decode(e.to_string()))?;
                Ok(extract_payload(body))
            }
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
            status => Err(FetchError::Status(status)),
        }
    }
}

/// Unwrap the provider envelope and filter out empty payloads.
///
/// The lifelogs endpoint nests the records under `data.lifelogs`; other
/// response shapes are passed through untouched for the formatter to
/// classify.
fn extract_payload(body: Value) -> Option<Value> {
    if let Some(lifelogs) = body
        .get("data")
        .and_then(|d| d.get("lifelogs"))
        .and_then(|l| l.as_array())
    {
        if lifelogs.is_empty() {
            return None;
        }
        return Some(Value::Array(lifelogs.clone()));
    }

    match &body {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        _ => Some(body),
    }
}

/// Retry wrapper enforcing the bounded rate-limit cooldown.
pub struct Fetcher<S> {
    source: S,
    cooldown: Duration,
    max_attempts: u32,
}

impl<S: TranscriptSource> Fetcher<S> {
    pub fn new(source: S, cooldown: Duration) -> Self {
        Self {
            source,
            cooldown,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn from_config(source: S, config: &Config) -> Self {
        Self::new(source, config.rate_limit_cooldown)
    }

    /// Fetch one date, sleeping through at most `max_attempts - 1`
    /// rate-limit responses before giving up.
    pub async fn fetch(&self, date: NaiveDate) -> Result<Option<Value>, FetchError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.source.fetch(date).await {
                Err(FetchError::RateLimited) if attempt < self.max_attempts => {
                    warn!(
                        %date,
                        attempt,
                        cooldown_secs = self.cooldown.as_secs(),
                        "Rate limited, cooling down before retry"
                    );
                    tokio::time::sleep(self.cooldown).await;
                }
                other => return other,
            }
        }
    }
}
