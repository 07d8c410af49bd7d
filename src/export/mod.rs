//! The exporter contract consumed by batching processors.
//!
//! An exporter ships a batch of records to some backend. The processor owns
//! its exporter exclusively and never calls it concurrently, which is why the
//! methods take `&mut self`. Retries, if any, are the exporter's business.

pub mod memory;

pub use memory::InMemoryExporter;

use crate::core::{ExportOutcome, InstanceRegistry, ProcessorInstance, Signal};
use crate::metrics::ExporterMetrics;
use crate::processor::ProcessorContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ships batches of records of type `R`.
#[async_trait]
pub trait Exporter<R: Send + 'static>: Send {
    /// Export one batch within `timeout`.
    async fn export(&mut self, batch: Vec<R>, timeout: Duration) -> ExportOutcome;

    /// Flush anything the exporter buffers internally.
    async fn force_flush(&mut self, _timeout: Duration) -> ExportOutcome {
        ExportOutcome::Success
    }

    /// Release resources. No export follows a shutdown.
    async fn shutdown(&mut self, _timeout: Duration) -> ExportOutcome {
        ExportOutcome::Success
    }
}

/// Exporter wrapper recording `otel.sdk.exporter.*` metrics.
///
/// The wrapper registers its own instance name (e.g.
/// `otlp_grpc_span_exporter/0`) and releases it on shutdown.
pub struct InstrumentedExporter<E> {
    inner: E,
    instance: ProcessorInstance,
    registry: Arc<InstanceRegistry>,
    metrics: ExporterMetrics,
}

impl<E> InstrumentedExporter<E> {
    /// Wrap `inner`, registering it under `component_type`.
    pub fn new(inner: E, component_type: &str, signal: Signal, context: &ProcessorContext) -> Self {
        let registry = Arc::clone(context.registry());
        let instance = registry.register_instance(component_type);
        let metrics = ExporterMetrics::new(context.metrics(), signal);

        tracing::debug!(component = %instance, "Registered instrumented exporter");

        Self {
            inner,
            instance,
            registry,
            metrics,
        }
    }

    /// Registry-issued name of this exporter
    pub fn name(&self) -> &str {
        self.instance.name()
    }

    /// The wrapped exporter
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

/// Records one export when dropped.
///
/// A future cancelled by the caller's timeout still reports `timeout`; a
/// panicking exporter reports a failure.
struct PendingExport<'a> {
    metrics: &'a ExporterMetrics,
    component_name: &'a str,
    count: usize,
    started: Instant,
    outcome: ExportOutcome,
}

impl Drop for PendingExport<'_> {
    fn drop(&mut self) {
        let outcome = if std::thread::panicking() {
            ExportOutcome::Failure
        } else {
            self.outcome
        };
        self.metrics.record_export(
            self.count,
            self.started.elapsed(),
            self.component_name,
            outcome.error_type(),
        );
    }
}

#[async_trait]
impl<R, E> Exporter<R> for InstrumentedExporter<E>
where
    R: Send + 'static,
    E: Exporter<R>,
{
    async fn export(&mut self, batch: Vec<R>, timeout: Duration) -> ExportOutcome {
        let mut pending = PendingExport {
            metrics: &self.metrics,
            component_name: self.instance.name(),
            count: batch.len(),
            started: Instant::now(),
            outcome: ExportOutcome::Timeout,
        };

        pending.outcome = tokio::time::timeout(timeout, self.inner.export(batch, timeout))
            .await
            .unwrap_or(ExportOutcome::Timeout);
        pending.outcome
    }

    async fn force_flush(&mut self, timeout: Duration) -> ExportOutcome {
        self.inner.force_flush(timeout).await
    }

    async fn shutdown(&mut self, timeout: Duration) -> ExportOutcome {
        let outcome = self.inner.shutdown(timeout).await;
        self.registry.unregister(self.instance.name());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{semconv, InMemoryMetrics, MetricsBackend};

    #[tokio::test]
    async fn test_instrumented_exporter_records_exported_count() {
        let memory = InMemoryMetrics::new();
        let backend: Arc<dyn MetricsBackend> = Arc::new(memory.clone());
        let registry = Arc::new(InstanceRegistry::new());
        let context = ProcessorContext::new(Arc::clone(&registry), Some(backend));

        let inner = InMemoryExporter::<u32>::new();
        let mut exporter =
            InstrumentedExporter::new(
                inner.clone(),
                "in_memory_span_exporter",
                Signal::Span,
                &context,
            );
        assert_eq!(exporter.name(), "in_memory_span_exporter/0");

        let timeout = Duration::from_secs(1);
        assert_eq!(exporter.export(vec![1, 2, 3], timeout).await, ExportOutcome::Success);
        inner.set_outcome(ExportOutcome::Failure);
        assert_eq!(exporter.export(vec![4], timeout).await, ExportOutcome::Failure);

        let exported = memory.measurements(semconv::OTEL_SDK_EXPORTER_SPAN_EXPORTED);
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].value, 3.0);
        assert_eq!(exported[0].attribute(semconv::ERROR_TYPE), None);
        assert_eq!(
            exported[1].attribute(semconv::OTEL_COMPONENT_NAME).as_deref(),
            Some("in_memory_span_exporter/0")
        );
        assert!(exported[1].attribute(semconv::ERROR_TYPE).is_some());

        exporter.shutdown(Duration::from_secs(1)).await;
        assert!(registry.live_names().is_empty());
        assert!(inner.is_shutdown());
    }

    struct HangingExporter;

    #[async_trait]
    impl Exporter<u32> for HangingExporter {
        async fn export(&mut self, _batch: Vec<u32>, _timeout: Duration) -> ExportOutcome {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_and_cancelled_exports_are_recorded() {
        let memory = InMemoryMetrics::new();
        let backend: Arc<dyn MetricsBackend> = Arc::new(memory.clone());
        let context = ProcessorContext::new(Arc::new(InstanceRegistry::new()), Some(backend));
        let mut exporter =
            InstrumentedExporter::new(
                HangingExporter,
                "hanging_log_exporter",
                Signal::Log,
                &context,
            );

        let outcome = exporter.export(vec![1, 2], Duration::from_millis(50)).await;
        assert_eq!(outcome, ExportOutcome::Timeout);

        // Caller gives up before the exporter's own timeout.
        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            exporter.export(vec![3, 4, 5], Duration::from_secs(60)),
        )
        .await;
        assert!(cancelled.is_err());

        let exported = memory.measurements(semconv::OTEL_SDK_EXPORTER_LOG_EXPORTED);
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].value, 2.0);
        assert_eq!(exported[1].value, 3.0);
        for measurement in &exported {
            assert_eq!(measurement.attribute(semconv::ERROR_TYPE).as_deref(), Some("timeout"));
        }
        assert_eq!(
            memory
                .measurements(semconv::OTEL_SDK_EXPORTER_OPERATION_DURATION)
                .len(),
            2
        );
    }
}
