//! HTTP meeting-link generator
//!
//! Posts the pair to a conferencing bridge (for example a small service that
//! owns the calendar credentials) and reads back `{"link": "..."}`. The bearer
//! token never leaves the daemon.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{LinkError, LinkGenerator};
use crate::config::LinksConfig;
use crate::domain::UserId;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 500;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Longest meeting link accepted from the bridge
const MAX_LINK_LEN: usize = 2048;

/// Reject links that are empty or too long to hand to clients
fn validate_link(link: String) -> Result<String, LinkError> {
    if link.trim().is_empty() {
        return Err(LinkError::InvalidResponse("empty link".to_string()));
    }
    if link.len() > MAX_LINK_LEN {
        return Err(LinkError::InvalidResponse(format!("link is {} bytes", link.len())));
    }
    Ok(link)
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    link: String,
}

/// Meeting links from a remote conferencing bridge
pub struct HttpLinkGenerator {
    endpoint: String,
    token: String,
    http: Client,
    meeting_minutes: i64,
}

impl HttpLinkGenerator {
    /// Create a generator from configuration
    ///
    /// Reads the bearer token from the environment variable named in config.
    pub fn from_config(config: &LinksConfig) -> Result<Self, LinkError> {
        debug!(endpoint = %config.endpoint, api_key_env = %config.api_key_env, "from_config: called");
        let token =
            std::env::var(&config.api_key_env).map_err(|_| LinkError::MissingCredential(config.api_key_env.clone()))?;

        Self::new(
            &config.endpoint,
            token,
            config.meeting_minutes,
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn new(endpoint: &str, token: String, meeting_minutes: i64, timeout: Duration) -> Result<Self, LinkError> {
        let http = Client::builder().timeout(timeout).build().map_err(LinkError::Network)?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            token,
            http,
            meeting_minutes,
        })
    }

    /// Build the event payload for a pair starting at `start`
    fn build_request_body(&self, user_a: &UserId, user_b: &UserId, start: DateTime<Utc>) -> serde_json::Value {
        let end = start + chrono::Duration::minutes(self.meeting_minutes);
        serde_json::json!({
            "summary": format!("Conversation: {} & {}", user_a, user_b),
            "attendees": [user_a.as_str(), user_b.as_str()],
            "start": start.to_rfc3339(),
            "end": end.to_rfc3339(),
        })
    }
}

#[async_trait]
impl LinkGenerator for HttpLinkGenerator {
    async fn generate(&self, user_a: &UserId, user_b: &UserId) -> Result<String, LinkError> {
        debug!(%user_a, %user_b, endpoint = %self.endpoint, "HttpLinkGenerator::generate: called");
        let body = self.build_request_body(user_a, user_b, Utc::now());

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "generate: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "generate: network error");
                    last_error = Some(LinkError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "generate: retryable error");
                last_error = Some(LinkError::Api { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                debug!(%status, "generate: API error");
                let text = response.text().await.unwrap_or_default();
                return Err(LinkError::Api { status, message: text });
            }

            let parsed: LinkResponse = response
                .json()
                .await
                .map_err(|e| LinkError::InvalidResponse(e.to_string()))?;

            let link = validate_link(parsed.link)?;
            debug!(%link, "generate: success");
            return Ok(link);
        }

        Err(last_error.unwrap_or_else(|| LinkError::InvalidResponse("Max retries exceeded".to_string())))
    }
}
