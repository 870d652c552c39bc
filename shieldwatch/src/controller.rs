/// Controller module for the shieldwatch attack monitor
///
/// Wires the provider client, watcher, notifier, worker pool and operator
/// console together, runs them until SIGINT/SIGTERM and shuts them down with
/// bounded waits.
use crate::config::{Config, ConfigStore};
use crate::console::Console;
use crate::delivery::{DiscordClient, Dispatcher};
use crate::detector::ChangeDetector;
use crate::notifier::Notifier;
use crate::operator::Operator;
use crate::provider::{ApiKey, AttackSource, RoyaleClient};
use crate::registry::WebhookRegistry;
use crate::runnable::TasksGroup;
use crate::watcher::{Watcher, refresh_channel};
use crate::worker_pool::{JobContext, WorkerPool};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

const SHUTDOWN_TIMEOUT_SECS: Duration = Duration::from_secs(10);
const TASK_SHUTDOWN_TIMEOUT_SECS: Duration = Duration::from_secs(1);

pub struct Controller {
    config: Config,
    store: ConfigStore,
    shutdown_sender: watch::Sender<bool>,
}

impl Controller {
    pub fn new(config: Config, store: ConfigStore) -> Self {
        let (shutdown_sender, _) = watch::channel(false);

        Self {
            config,
            store,
            shutdown_sender,
        }
    }

    /// Starts the monitor and returns once it has shut down.
    ///
    /// If the provider cannot be reached at startup nothing is scheduled and
    /// the process idles until a shutdown signal arrives.
    pub async fn start(self) -> Result<()> {
        let api_key = ApiKey::new(self.config.api_key.clone());
        let source: Arc<dyn AttackSource> =
            Arc::new(RoyaleClient::new(&self.config.provider, api_key.clone())?);
        let sink = Arc::new(DiscordClient::new(&self.config.delivery)?);
        let registry = Arc::new(WebhookRegistry::from_webhooks(self.config.webhooks.clone()));
        tracing::info!("Loaded {} webhooks", registry.len());

        tracing::info!("Starting the attack provider client ..");
        match source.fetch_ips().await {
            Ok(ips) => tracing::info!("Received {} IPs.", ips.len()),
            Err(e) => {
                tracing::error!("Failed to reach the attack provider: {}", e);
                tracing::warn!("Attack watcher not started, waiting for shutdown");
                Self::wait_for_signal().await?;
                return Ok(());
            }
        }

        let shutdown_receiver = self.shutdown_sender.subscribe();

        let mut worker_pool = WorkerPool::new(
            self.config.delivery.workers,
            JobContext {
                source: source.clone(),
                dispatcher: Dispatcher::new(sink, registry.clone()),
                content: self.config.content.clone(),
            },
            shutdown_receiver.clone(),
        );
        worker_pool.run();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (refresh, refresh_rx) = refresh_channel();

        let watcher = Watcher::new(
            ChangeDetector::new(source),
            self.config.interval,
            event_tx,
            refresh_rx,
            shutdown_receiver.clone(),
        );
        let notifier = Notifier::new(event_rx, worker_pool.sender(), shutdown_receiver.clone());
        let operator = Operator::new(
            registry,
            api_key,
            self.store.clone(),
            self.config.clone(),
            worker_pool.sender(),
            refresh,
        );
        let console = Console::stdio(operator, shutdown_receiver);

        let mut group = TasksGroup::new("Watch Group");
        group.add_task(Box::new(watcher));
        group.add_task(Box::new(notifier));
        group.add_task(Box::new(console));
        group.run();
        tracing::info!("Attack watcher initialized.");

        let signal_result = Self::wait_for_signal().await;
        if self.shutdown_sender.send(true).is_err() {
            tracing::warn!("No tasks were listening for the shutdown signal");
        }

        group
            .wait_for_shutdown(TASK_SHUTDOWN_TIMEOUT_SECS, SHUTDOWN_TIMEOUT_SECS)
            .await;
        if timeout(SHUTDOWN_TIMEOUT_SECS, worker_pool.shutdown())
            .await
            .is_err()
        {
            tracing::warn!("WorkerPool shutdown timed out, abandoning in-flight deliveries");
        }

        tracing::info!("Shutdown complete");
        signal_result
    }

    async fn wait_for_signal() -> Result<()> {
        let mut sigint_stream = signal(SignalKind::interrupt()).context("watch SIGINT failed")?;
        let mut sigterm_stream =
            signal(SignalKind::terminate()).context("watch SIGTERM failed")?;
        tokio::select! {
            _ = sigint_stream.recv() => {
                tracing::info!("SIGINT received, shutdown initiated...");
            }
            _ = sigterm_stream.recv() => {
                tracing::info!("SIGTERM received, shutdown initiated...");
            }
        }
        Ok(())
    }
}
