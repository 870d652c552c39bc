use std::time::Duration;

use async_trait::async_trait;
use tokio::{task::JoinHandle, time::timeout};

/// Trait for components that run as long-lived background tasks
///
/// Implemented by the watcher, the notifier and the console.
///
/// # Methods
/// * `run` - Runs the component until its input ends or shutdown is signalled
/// * `name` - Returns the name identifier of the component
#[async_trait]
pub trait Runnable: Send {
    async fn run(&mut self);

    fn name(&self) -> &str;
}

/// A named set of runnables started together and shut down together.
pub struct TasksGroup {
    name: String,
    tasks: Vec<Box<dyn Runnable>>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl TasksGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: vec![],
            handles: vec![],
        }
    }

    pub fn add_task(&mut self, task: Box<dyn Runnable>) {
        self.tasks.push(task);
    }

    pub fn run(&mut self) {
        for mut task in self.tasks.drain(..) {
            let name = task.name().to_string();
            tracing::debug!("starting {}", name);
            let handle = tokio::spawn(async move {
                task.run().await;
            });
            self.handles.push((name, handle));
        }
    }

    pub async fn wait_for_shutdown(&mut self, handle_timeout: Duration, group_timeout: Duration) {
        tracing::debug!("{} waiting for shutdown", self.name);
        match timeout(group_timeout, self.shutdown(handle_timeout)).await {
            Ok(()) => {
                tracing::info!("{} shutdown complete", self.name);
            }
            Err(_) => {
                tracing::warn!(
                    "{} shutdown timed out after {} seconds",
                    self.name,
                    group_timeout.as_secs()
                );
                for (_, handle) in &self.handles {
                    handle.abort();
                }
            }
        }
    }

    async fn shutdown(&mut self, wait_timeout: Duration) {
        for (name, handle) in self.handles.iter_mut() {
            match timeout(wait_timeout, &mut *handle).await {
                Ok(Ok(())) => {
                    tracing::debug!("{} shutdown complete", name);
                }
                Ok(Err(e)) => {
                    tracing::warn!("{} ended abnormally: {}", name, e);
                }
                Err(_) => {
                    tracing::warn!(
                        "{} shutdown timed out after {} ms, aborting",
                        name,
                        wait_timeout.as_millis()
                    );
                    handle.abort();
                }
            }
        }
    }
}
