/// Watcher module for the shieldwatch attack monitor
///
/// The watcher owns the change detector and is the only task that ticks it:
/// timer ticks and operator refresh requests arrive in the same loop, so two
/// ticks never overlap.
use crate::detector::ChangeDetector;
use crate::message::WatchEvent;
use crate::runnable::Runnable;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, MissedTickBehavior, interval};

const WATCHER_NAME: &str = "Watcher";

/// Requests an out-of-schedule tick from the watcher.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Returns `false` when a refresh is already pending; the request is dropped.
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Creates a refresh handle and the receiver the watcher listens on.
pub fn refresh_channel() -> (RefreshHandle, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (RefreshHandle { tx }, rx)
}

pub struct Watcher {
    detector: ChangeDetector,
    interval: Duration,
    event_tx: mpsc::UnboundedSender<WatchEvent>,
    refresh_rx: mpsc::Receiver<()>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Watcher {
    pub fn new(
        detector: ChangeDetector,
        interval: Duration,
        event_tx: mpsc::UnboundedSender<WatchEvent>,
        refresh_rx: mpsc::Receiver<()>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            detector,
            interval,
            event_tx,
            refresh_rx,
            shutdown_rx,
        }
    }

    /// Runs one detector tick and forwards its events.
    ///
    /// Returns `false` once nobody is listening for events anymore.
    async fn tick(&mut self) -> bool {
        let events = match self.detector.tick().await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Failed to refresh attack list: {}", e);
                return true;
            }
        };

        for event in events {
            if self.event_tx.send(event).is_err() {
                tracing::warn!("{}: event receiver closed", WATCHER_NAME);
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl Runnable for Watcher {
    async fn run(&mut self) {
        tracing::info!("Starting {} with a {:?} interval", WATCHER_NAME, self.interval);
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let keep_going = tokio::select! {
                _ = ticker.tick() => self.tick().await,
                Some(()) = self.refresh_rx.recv() => {
                    tracing::debug!("Manual refresh requested");
                    self.tick().await
                }
                _ = self.shutdown_rx.changed() => {
                    tracing::info!("{}: Shutdown signal received", WATCHER_NAME);
                    false
                }
            };
            if !keep_going {
                break;
            }
        }
        tracing::info!("{} stopped.", WATCHER_NAME);
    }

    fn name(&self) -> &str {
        WATCHER_NAME
    }
}
