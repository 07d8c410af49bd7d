//! Exporter that keeps batches in memory.

use crate::core::ExportOutcome;
use crate::export::Exporter;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct ExporterState<R> {
    batches: Vec<Vec<R>>,
    outcome: ExportOutcome,
    force_flushes: usize,
    shutdown: bool,
}

/// Collects every exported batch; clones share the same storage.
pub struct InMemoryExporter<R> {
    state: Arc<Mutex<ExporterState<R>>>,
}

impl<R> Clone for InMemoryExporter<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R> Default for InMemoryExporter<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> InMemoryExporter<R> {
    /// Exporter answering `Success`
    pub fn new() -> Self {
        Self::with_outcome(ExportOutcome::Success)
    }

    /// Exporter answering `outcome` to every export
    pub fn with_outcome(outcome: ExportOutcome) -> Self {
        Self {
            state: Arc::new(Mutex::new(ExporterState {
                batches: Vec::new(),
                outcome,
                force_flushes: 0,
                shutdown: false,
            })),
        }
    }

    /// Change the outcome of subsequent exports
    pub fn set_outcome(&self, outcome: ExportOutcome) {
        self.state.lock().outcome = outcome;
    }

    /// Sizes of the exported batches, in export order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().batches.iter().map(Vec::len).collect()
    }

    /// Number of export calls received
    pub fn export_calls(&self) -> usize {
        self.state.lock().batches.len()
    }

    /// Number of force-flush calls received
    pub fn force_flushes(&self) -> usize {
        self.state.lock().force_flushes
    }

    /// Whether shutdown was called
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }
}

impl<R: Clone> InMemoryExporter<R> {
    /// Every exported record, flattened in export order
    pub fn records(&self) -> Vec<R> {
        self.state.lock().batches.iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl<R: Send + 'static> Exporter<R> for InMemoryExporter<R> {
    async fn export(&mut self, batch: Vec<R>, _timeout: Duration) -> ExportOutcome {
        let mut state = self.state.lock();
        if state.shutdown {
            return ExportOutcome::Failure;
        }
        state.batches.push(batch);
        state.outcome
    }

    async fn force_flush(&mut self, _timeout: Duration) -> ExportOutcome {
        self.state.lock().force_flushes += 1;
        ExportOutcome::Success
    }

    async fn shutdown(&mut self, _timeout: Duration) -> ExportOutcome {
        self.state.lock().shutdown = true;
        ExportOutcome::Success
    }
}
