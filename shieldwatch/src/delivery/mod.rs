mod discord;

use crate::error::DeliveryError;
use crate::registry::{Webhook, WebhookRegistry};
use crate::render::WebhookMessage;
use async_trait::async_trait;
use std::sync::Arc;

pub use discord::DiscordClient;

/// Transport for posting one rendered message to one webhook.
///
/// Implementations report their own failure; the dispatcher keeps one
/// webhook's failure from touching any other.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn post(&self, message: &WebhookMessage, webhook: &Webhook) -> Result<(), DeliveryError>;
}

/// Outcome of delivering one message to one webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub webhook_id: u64,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fans one message out to every registered webhook.
pub struct Dispatcher {
    sink: Arc<dyn WebhookSink>,
    registry: Arc<WebhookRegistry>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn WebhookSink>, registry: Arc<WebhookRegistry>) -> Self {
        Self { sink, registry }
    }

    /// Delivers `message` to the webhooks registered right now, concurrently.
    ///
    /// Webhooks added or removed while a dispatch is running are not seen by it.
    /// Every failure is logged and returned in its report; nothing is raised.
    pub async fn dispatch(&self, message: &WebhookMessage) -> Vec<DeliveryReport> {
        let webhooks = self.registry.list();
        if webhooks.is_empty() {
            tracing::warn!("No webhooks registered, notification dropped");
            return Vec::new();
        }

        let deliveries = webhooks.iter().map(|webhook| async move {
            let result = self.sink.post(message, webhook).await;
            match &result {
                Ok(()) => tracing::debug!("Delivered notification to webhook {}", webhook.id),
                Err(e) => tracing::warn!("Webhook {} delivery failed: {}", webhook.id, e),
            }
            DeliveryReport {
                webhook_id: webhook.id,
                result,
            }
        });

        futures::future::join_all(deliveries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render;
    use crate::testing::detail;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use std::time::Duration;

    fn registry_of(ids: &[u64]) -> Arc<WebhookRegistry> {
        let registry = WebhookRegistry::new();
        for id in ids {
            registry.add(format!("tok{}", id), *id).unwrap();
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_failing_webhook_is_isolated() {
        let mut sink = MockWebhookSink::new();
        sink.expect_post().times(3).returning(|_, webhook| {
            if webhook.id == 2 {
                Err(DeliveryError::Rejected {
                    status: StatusCode::UNAUTHORIZED,
                    body: "invalid webhook token".to_string(),
                })
            } else {
                Ok(())
            }
        });
        let dispatcher = Dispatcher::new(Arc::new(sink), registry_of(&[1, 2, 3]));

        let reports = dispatcher.dispatch(&render(&detail(1, false), None)).await;

        let outcomes: Vec<(u64, bool)> = reports
            .iter()
            .map(|r| (r.webhook_id, r.is_delivered()))
            .collect();
        assert_eq!(outcomes, vec![(1, true), (2, false), (3, true)]);
    }

    #[tokio::test]
    async fn test_no_webhooks_dispatches_nothing() {
        let mut sink = MockWebhookSink::new();
        sink.expect_post().never();
        let dispatcher = Dispatcher::new(Arc::new(sink), registry_of(&[]));

        let reports = dispatcher.dispatch(&render(&detail(1, false), None)).await;

        assert!(reports.is_empty());
    }

    /// Sink that stalls on some webhooks to prove the others don't wait for them.
    struct StallingSink {
        stalled: Vec<u64>,
    }

    #[async_trait]
    impl WebhookSink for StallingSink {
        async fn post(&self, _: &WebhookMessage, webhook: &Webhook) -> Result<(), DeliveryError> {
            if self.stalled.contains(&webhook.id) {
                tokio::time::sleep(Duration::from_millis(300)).await;
                return Err(DeliveryError::Timeout);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_deliveries_run_concurrently() {
        let sink = Arc::new(StallingSink {
            stalled: vec![1, 3],
        });
        let dispatcher = Dispatcher::new(sink, registry_of(&[1, 2, 3, 4]));

        let started = tokio::time::Instant::now();
        let reports = dispatcher.dispatch(&render(&detail(1, false), None)).await;

        // sequential posts would stall twice
        assert!(started.elapsed() < Duration::from_millis(550));
        assert_eq!(reports.iter().filter(|r| r.is_delivered()).count(), 2);
        assert_eq!(reports[0].result, Err(DeliveryError::Timeout));
    }
}
