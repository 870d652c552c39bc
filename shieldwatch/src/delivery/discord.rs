//! Discord-compatible webhook delivery.
//!
//! Posts the rendered message to `{base_url}/webhooks/{id}/{token}`. By default
//! a single attempt is made per webhook; with `max_attempts > 1` network
//! errors, timeouts, 429 and 5xx responses are retried, honoring Retry-After.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::debug;

use super::WebhookSink;
use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::registry::Webhook;
use crate::render::WebhookMessage;

/// Longest server-requested wait honored before a retry.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

pub struct DiscordClient {
    base_url: String,
    client: reqwest::Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl DiscordClient {
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay,
        })
    }

    fn webhook_url(&self, webhook: &Webhook) -> String {
        format!("{}/webhooks/{}/{}", self.base_url, webhook.id, webhook.token)
    }

    async fn post_once(
        &self,
        message: &WebhookMessage,
        webhook: &Webhook,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.webhook_url(webhook))
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DeliveryError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }

        if status.is_server_error() {
            return Err(DeliveryError::Server(status));
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected { status, body })
    }
}

/// Parses the Retry-After duration from a 429 response, capped at `MAX_RETRY_AFTER`.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok()?.parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_or(MAX_RETRY_AFTER, |d| d.min(MAX_RETRY_AFTER))
        })
}

#[async_trait]
impl WebhookSink for DiscordClient {
    async fn post(&self, message: &WebhookMessage, webhook: &Webhook) -> Result<(), DeliveryError> {
        let mut attempt = 1;
        loop {
            match self.post_once(message, webhook).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_attempts && e.is_retryable() => {
                    let wait = match &e {
                        DeliveryError::RateLimited {
                            retry_after: Some(retry_after),
                        } => *retry_after,
                        _ => self.retry_delay,
                    };
                    debug!(
                        "Webhook {} attempt {}/{} failed: {}, retrying in {:?}",
                        webhook.id, attempt, self.max_attempts, e, wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
