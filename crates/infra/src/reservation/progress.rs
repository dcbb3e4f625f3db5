//! Observational pipeline progress: a watchable stage plus an in-order log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;

use stockhold_core::{Clock, OrderId};
use stockhold_orders::{OrderStatus, PipelineStage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub stage: PipelineStage,
    pub step: u8,
    pub message: String,
    pub at_ms: i64,
}

/// Per-run progress. No business decision reads it.
pub struct ProgressTracker {
    stage: Arc<watch::Sender<PipelineStage>>,
    log: Vec<ProgressEntry>,
    clock: Arc<dyn Clock>,
}

impl ProgressTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (tx, _rx) = watch::channel(PipelineStage::Idle);
        Self {
            stage: Arc::new(tx),
            log: Vec::new(),
            clock,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStage> {
        self.stage.subscribe()
    }

    pub fn stage(&self) -> PipelineStage {
        *self.stage.borrow()
    }

    pub fn log(&self) -> &[ProgressEntry] {
        &self.log
    }

    pub fn into_log(self) -> Vec<ProgressEntry> {
        self.log
    }

    /// Move to `stage` and record `message`.
    pub fn advance(&mut self, stage: PipelineStage, message: impl Into<String>) {
        self.stage.send_replace(stage);
        self.record(message.into());
    }

    /// Record `message` at the current stage.
    pub fn note(&mut self, message: impl Into<String>) {
        self.record(message.into());
    }

    fn record(&mut self, message: String) {
        let stage = self.stage();
        tracing::info!(step = stage.step(), stage = %stage, "{message}");
        self.log.push(ProgressEntry {
            stage,
            step: stage.step(),
            message,
            at_ms: self.clock.now_ms(),
        });
    }

    fn handle(&self) -> Arc<watch::Sender<PipelineStage>> {
        self.stage.clone()
    }
}

/// Stage channels of runs whose orders are still awaiting a terminal outcome.
#[derive(Default)]
pub struct ProgressBoard {
    runs: Mutex<HashMap<OrderId, Arc<watch::Sender<PipelineStage>>>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand the run's stage over to the board once its order is persisted.
    pub fn register(&self, order: OrderId, tracker: &ProgressTracker) {
        self.with_runs(|runs| {
            runs.insert(order, tracker.handle());
        });
    }

    pub fn stage_of(&self, order: OrderId) -> Option<PipelineStage> {
        self.with_runs(|runs| runs.get(&order).map(|tx| *tx.borrow()))
    }

    /// Final stage for a committed terminal status: `completed` on success,
    /// back to `idle` otherwise.
    pub fn finish(&self, order: OrderId, status: OrderStatus) {
        if let Some(tx) = self.with_runs(|runs| runs.remove(&order)) {
            let stage = if status == OrderStatus::Success {
                PipelineStage::Completed
            } else {
                PipelineStage::Idle
            };
            tx.send_replace(stage);
        }
    }

    fn with_runs<T>(&self, f: impl FnOnce(&mut HashMap<OrderId, Arc<watch::Sender<PipelineStage>>>) -> T) -> T {
        let mut guard = self.runs.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}
