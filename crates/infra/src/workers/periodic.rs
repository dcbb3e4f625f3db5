use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::reservation::EngineError;

/// One unit of periodic work.
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> Result<(), EngineError>;
}

/// Handle to stop a spawned worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request shutdown and wait for the loop to exit. A run in progress is
    /// allowed to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.join.await {
            tracing::warn!(worker = self.name, error = %e, "worker ended abnormally");
        }
    }
}

pub struct PeriodicWorker;

impl PeriodicWorker {
    /// Run `task` immediately and then every `every`. Overrunning ticks are
    /// skipped rather than queued.
    pub fn spawn(task: Arc<dyn PeriodicTask>, every: Duration) -> WorkerHandle {
        let name = task.name();
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();

        let join = tokio::spawn(async move {
            tracing::info!(worker = name, every_ms = every.as_millis() as u64, "worker started");
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = task.run_once().await {
                            if e.is_transient() {
                                tracing::warn!(worker = name, error = %e, "run failed; retrying next tick");
                            } else {
                                tracing::error!(worker = name, error = %e, kind = ?e.kind(), "run failed");
                            }
                        }
                    }
                }
            }
            tracing::info!(worker = name, "worker stopped");
        });

        WorkerHandle {
            name,
            shutdown,
            join,
        }
    }
}
