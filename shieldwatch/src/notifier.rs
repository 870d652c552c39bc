use crate::message::WatchEvent;
use crate::runnable::Runnable;
use crate::worker_pool::Job;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

const NOTIFIER_NAME: &str = "Notifier";

/// Consumes watcher events: logs refreshes and queues a notification job for
/// every transition.
pub struct Notifier {
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    job_tx: mpsc::Sender<Job>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Notifier {
    pub fn new(
        event_rx: mpsc::UnboundedReceiver<WatchEvent>,
        job_tx: mpsc::Sender<Job>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            event_rx,
            job_tx,
            shutdown_rx,
        }
    }

    async fn handle(&self, event: WatchEvent) {
        match event {
            WatchEvent::Refreshed(snapshot) => {
                tracing::info!("Attack list refreshed ({} attacks)", snapshot.len());
            }
            WatchEvent::Transition(transition) => {
                let id = transition.detail().id();
                let kind = transition.kind();
                if let Err(e) = self.job_tx.send(Job::Notify(transition)).await {
                    tracing::error!("Failed to queue notification for attack {} {}: {}", id, kind, e);
                }
            }
        }
    }
}

#[async_trait]
impl Runnable for Notifier {
    async fn run(&mut self) {
        loop {
            tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        tracing::info!("{}: event channel closed", NOTIFIER_NAME);
                        break;
                    }
                },
                _ = self.shutdown_rx.changed() => {
                    tracing::info!("{}: Shutdown signal received", NOTIFIER_NAME);
                    break;
                }
            }
        }
    }

    fn name(&self) -> &str {
        NOTIFIER_NAME
    }
}
