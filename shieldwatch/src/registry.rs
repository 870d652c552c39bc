/// Registry of outbound webhooks
///
/// Holds the webhooks notifications are fanned out to. Mutations come from the
/// operator console and are rare; reads happen once per dispatch and take a
/// cloned snapshot so a concurrent add/remove never affects a dispatch that
/// already started.
use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// One delivery target, addressed by numeric id and secret token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub token: String,
    pub id: u64,
}

impl Webhook {
    pub fn new(token: impl Into<String>, id: u64) -> Self {
        Self {
            token: token.into(),
            id,
        }
    }

    fn matches(&self, key: &str) -> bool {
        self.token == key || self.id.to_string() == key
    }
}

#[derive(Debug, Default)]
pub struct WebhookRegistry {
    webhooks: RwLock<Vec<Webhook>>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from persisted entries, skipping blank and duplicate ones.
    pub fn from_webhooks(webhooks: impl IntoIterator<Item = Webhook>) -> Self {
        let registry = Self::new();
        for webhook in webhooks {
            if webhook.token.trim().is_empty() {
                tracing::warn!("Skipping webhook {} with an empty token", webhook.id);
                continue;
            }
            let id = webhook.id;
            if let Err(e) = registry.add(webhook.token, webhook.id) {
                tracing::warn!("Skipping configured webhook {}: {}", id, e);
            }
        }
        registry
    }

    /// Registers a webhook unless its token or id is already taken.
    pub fn add(&self, token: impl Into<String>, id: u64) -> Result<(), RegistryError> {
        let token = token.into();
        let mut webhooks = self.webhooks.write().unwrap_or_else(PoisonError::into_inner);

        if webhooks.iter().any(|w| w.token == token || w.id == id) {
            return Err(RegistryError::Duplicate { id });
        }

        webhooks.push(Webhook::new(token, id));
        Ok(())
    }

    /// Removes every webhook whose token or id matches `key`.
    pub fn remove(&self, key: &str) -> Result<usize, RegistryError> {
        let mut webhooks = self.webhooks.write().unwrap_or_else(PoisonError::into_inner);

        let before = webhooks.len();
        webhooks.retain(|w| !w.matches(key));
        let removed = before - webhooks.len();

        if removed == 0 {
            return Err(RegistryError::NotFound(key.to_string()));
        }
        Ok(removed)
    }

    /// Snapshot of the registered webhooks in insertion order.
    pub fn list(&self) -> Vec<Webhook> {
        self.webhooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.webhooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
