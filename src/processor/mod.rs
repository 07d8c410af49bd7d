//! Batching processors.
//!
//! A [`BatchProcessor`] buffers records in a [`BoundedQueue`], exports them in
//! batches from a background task and reports its own health through the
//! self-metrics binding. Collaborators (instance registry, metrics backend)
//! are injected through a [`ProcessorContext`].

pub mod batch;
pub mod queue;

pub use batch::{BatchProcessor, BatchProcessorBuilder, ProcessorStats};
pub use queue::{Admission, BoundedQueue};

use crate::core::InstanceRegistry;
use crate::metrics::{discover_backend, MetricsBackend};
use std::sync::Arc;

/// Shared collaborators handed to processors and instrumented exporters.
#[derive(Clone)]
pub struct ProcessorContext {
    registry: Arc<InstanceRegistry>,
    metrics: Option<Arc<dyn MetricsBackend>>,
}

impl std::fmt::Debug for ProcessorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorContext")
            .field("registry", &self.registry)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ProcessorContext {
    fn default() -> Self {
        Self::discover()
    }
}

impl ProcessorContext {
    /// Explicit registry and optional metrics backend.
    pub fn new(registry: Arc<InstanceRegistry>, metrics: Option<Arc<dyn MetricsBackend>>) -> Self {
        Self { registry, metrics }
    }

    /// Process-wide registry and whatever backend is installed globally right now.
    pub fn discover() -> Self {
        Self::new(InstanceRegistry::global(), discover_backend())
    }

    /// Context with no metrics backend.
    pub fn without_metrics(registry: Arc<InstanceRegistry>) -> Self {
        Self::new(registry, None)
    }

    /// Instance registry
    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Metrics backend, if any
    pub fn metrics(&self) -> Option<&Arc<dyn MetricsBackend>> {
        self.metrics.as_ref()
    }
}
