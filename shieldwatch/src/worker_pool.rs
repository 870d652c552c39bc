use crate::{
    delivery::{DeliveryReport, Dispatcher},
    message::Transition,
    provider::AttackSource,
    render::{WebhookMessage, render},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{
    Mutex,
    mpsc::{self, Receiver},
    watch,
};

const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Work handed to the notification workers.
#[derive(Debug)]
pub enum Job {
    /// Render and deliver one detected transition.
    Notify(Transition),
    /// Fetch the most recent attack and deliver it, whatever the watcher saw.
    SendLatest,
}

/// What every worker needs to turn a job into deliveries.
pub struct JobContext {
    pub source: Arc<dyn AttackSource>,
    pub dispatcher: Dispatcher,
    // Default text sent with transition notifications.
    pub content: Option<String>,
}

/// Bounded pool of notification workers sharing one job queue.
///
/// Slow or failing deliveries only occupy a worker; the watcher keeps polling.
/// Every job's outcome is logged by the worker that ran it.
pub struct WorkerPool {
    job_tx: mpsc::Sender<Job>,
    job_rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    handles: Vec<HandleHolder>,
    num_workers: usize,
    ctx: Arc<JobContext>,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorkerPool {
    pub fn new(num_workers: usize, ctx: JobContext, shutdown_rx: watch::Receiver<bool>) -> Self {
        let num_workers = num_workers.max(1);
        let (job_tx, job_rx) =
            mpsc::channel::<Job>(Self::calculate_channel_capacity(num_workers));
        Self {
            job_tx,
            job_rx: Arc::new(Mutex::new(job_rx)),
            handles: Vec::new(),
            num_workers,
            ctx: Arc::new(ctx),
            shutdown_rx,
        }
    }

    pub fn run(&mut self) {
        for i in 0..self.num_workers {
            let worker = Worker::new(
                i,
                self.ctx.clone(),
                self.job_rx.clone(),
                self.shutdown_rx.clone(),
            );
            let name = worker.name.clone();

            let handle = tokio::spawn(async move {
                worker.run().await;
            });
            self.handles.push(HandleHolder { name, handle });
        }

        tracing::info!("WorkerPool started with {} workers", self.num_workers);
    }

    /// A sender for queueing jobs from other components.
    pub fn sender(&self) -> mpsc::Sender<Job> {
        self.job_tx.clone()
    }

    pub async fn shutdown(self) {
        tracing::info!("Shutting down WorkerPool with {} workers", self.num_workers);
        drop(self.job_tx);

        for mut holder in self.handles {
            match tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, &mut holder.handle).await {
                Ok(_) => {
                    tracing::debug!("{} completed successfully", holder.name);
                }
                Err(_) => {
                    tracing::warn!("{} did not shut down in time, abandoning its job", holder.name);
                    holder.handle.abort();
                }
            }
        }
        tracing::info!("WorkerPool shutdown complete");
    }

    fn calculate_channel_capacity(worker_count: usize) -> usize {
        (worker_count * 8).clamp(8, 256)
    }
}

struct HandleHolder {
    name: String,
    handle: tokio::task::JoinHandle<()>,
}

struct Worker {
    name: String,
    ctx: Arc<JobContext>,
    rx: Arc<Mutex<Receiver<Job>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    fn new(
        id: usize,
        ctx: Arc<JobContext>,
        rx: Arc<Mutex<Receiver<Job>>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name: format!("Worker-{}", id),
            ctx,
            rx,
            shutdown_rx,
        }
    }

    async fn run(mut self) {
        tracing::debug!("{} started", self.name);

        loop {
            let job = tokio::select! {
                job = Self::receive(&self.rx) => job,
                _ = self.shutdown_rx.changed() => None,
            };
            match job {
                Some(job) => {
                    self.process(job).await;
                }
                None => break,
            }
        }

        tracing::debug!("{} stopped", self.name);
    }

    async fn receive(rx: &Mutex<Receiver<Job>>) -> Option<Job> {
        let mut rx = rx.lock().await;
        rx.recv().await
    }

    /// Runs one job to completion and returns the per-webhook outcomes.
    async fn process(&self, job: Job) -> Vec<DeliveryReport> {
        match job {
            Job::Notify(transition) => {
                let detail = transition.detail();
                tracing::info!(
                    "Attack {} {} on {}",
                    detail.id(),
                    transition.kind(),
                    detail.attack.target
                );
                let message = render(detail, self.ctx.content.as_deref());
                self.deliver(&message).await
            }
            Job::SendLatest => self.send_latest().await,
        }
    }

    async fn send_latest(&self) -> Vec<DeliveryReport> {
        let snapshot = match self.ctx.source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Failed to fetch attack list: {}", e);
                return Vec::new();
            }
        };

        let Some(latest) = snapshot.attacks.first() else {
            tracing::info!("No attacks to send");
            return Vec::new();
        };

        match self.ctx.source.fetch_detail(latest.id).await {
            Ok(detail) => self.deliver(&render(&detail, None)).await,
            Err(e) => {
                tracing::error!("Failed to fetch details of attack {}: {}", latest.id, e);
                Vec::new()
            }
        }
    }

    async fn deliver(&self, message: &WebhookMessage) -> Vec<DeliveryReport> {
        let reports = self.ctx.dispatcher.dispatch(message).await;
        let delivered = reports.iter().filter(|r| r.is_delivered()).count();
        tracing::info!(
            "{}: notification delivered to {}/{} webhooks",
            self.name,
            delivered,
            reports.len()
        );
        reports
    }
}
