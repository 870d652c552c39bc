//! Operator commands.
//!
//! Each command is one whitespace-separated line and answers with a short
//! status string. Registry and credential changes are persisted right away;
//! a failed save is logged key by key and the in-memory state stays in effect.

use crate::config::{Config, ConfigStore, log_key_errors};
use crate::error::RegistryError;
use crate::provider::ApiKey;
use crate::registry::WebhookRegistry;
use crate::watcher::RefreshHandle;
use crate::worker_pool::Job;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

const HELP: &str = "Commands:
  add <token> <id>      register a webhook
  remove <idOrToken>    remove every webhook matching the id or token
  list                  show registered webhooks
  latest                send the most recent attack to every webhook
  key <key>             replace the provider API key
  refresh               poll the attack list now
  help                  show this help";

pub struct Operator {
    registry: Arc<WebhookRegistry>,
    api_key: ApiKey,
    store: ConfigStore,
    // Settings not changed by commands, written back on every save.
    base: Config,
    job_tx: mpsc::Sender<Job>,
    refresh: RefreshHandle,
}

impl Operator {
    pub fn new(
        registry: Arc<WebhookRegistry>,
        api_key: ApiKey,
        store: ConfigStore,
        base: Config,
        job_tx: mpsc::Sender<Job>,
        refresh: RefreshHandle,
    ) -> Self {
        Self {
            registry,
            api_key,
            store,
            base,
            job_tx,
            refresh,
        }
    }

    /// Runs one command line and returns the status to show the operator.
    pub fn execute(&self, line: &str) -> String {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return String::new();
        };
        let args: Vec<&str> = parts.collect();
        tracing::debug!("operator command: {}", command);

        match command.to_lowercase().as_str() {
            "add" => self.add(&args),
            "remove" => self.remove(&args),
            "list" => self.list(),
            "latest" => self.latest(),
            "key" => self.set_key(&args),
            "refresh" => self.refresh(),
            "help" => HELP.to_string(),
            other => format!("Unknown command '{}'. Type 'help' for a list of commands.", other),
        }
    }

    fn add(&self, args: &[&str]) -> String {
        let [token, id] = args else {
            return "Missing arguments! add <token> <id>".to_string();
        };
        let Ok(id) = id.parse::<u64>() else {
            return format!("Invalid id '{}'! add <token> <id>", id);
        };

        match self.registry.add(*token, id) {
            Ok(()) => {
                tracing::info!("Webhook {} added", id);
                self.persist();
                "Webhook added.".to_string()
            }
            Err(RegistryError::Duplicate { .. }) => "This webhook has already been added.".to_string(),
            Err(e) => e.to_string(),
        }
    }

    fn remove(&self, args: &[&str]) -> String {
        let [key] = args else {
            return "Missing arguments! remove <idOrToken>".to_string();
        };

        match self.registry.remove(key) {
            Ok(count) => {
                tracing::info!("Removed {} webhook(s)", count);
                self.persist();
                "Webhook removed.".to_string()
            }
            Err(_) => "No webhooks were found.".to_string(),
        }
    }

    fn list(&self) -> String {
        let webhooks = self.registry.list();
        if webhooks.is_empty() {
            return "No webhooks registered.".to_string();
        }

        let mut out = format!("{} webhook(s):", webhooks.len());
        for webhook in webhooks {
            out.push_str(&format!("\n  {} ({})", webhook.id, mask_token(&webhook.token)));
        }
        out
    }

    fn latest(&self) -> String {
        match self.job_tx.try_send(Job::SendLatest) {
            Ok(()) => "Requesting attacks ..".to_string(),
            Err(TrySendError::Full(_)) => {
                "Notification queue is full, try again later.".to_string()
            }
            Err(TrySendError::Closed(_)) => "Notification workers are not running.".to_string(),
        }
    }

    fn set_key(&self, args: &[&str]) -> String {
        let [key] = args else {
            return "Missing arguments! key <key>".to_string();
        };

        self.api_key.set(*key);
        tracing::info!("Provider API key replaced");
        self.persist();
        "Key saved.".to_string()
    }

    fn refresh(&self) -> String {
        if self.refresh.request() {
            "Refresh requested.".to_string()
        } else {
            "A refresh is already pending.".to_string()
        }
    }

    fn persist(&self) {
        let config = Config {
            api_key: self.api_key.get(),
            webhooks: self.registry.list(),
            ..self.base.clone()
        };
        if let Err(e) = self.store.save(&config) {
            log_key_errors("save", &e.failures);
        }
    }
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
