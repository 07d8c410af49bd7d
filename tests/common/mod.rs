//! Common test utilities and fixtures.
#![allow(dead_code)]

use async_trait::async_trait;
use opentelemetry::KeyValue;
use otel_selfobs::core::MetricsError;
use otel_selfobs::metrics::{
    Counter, Histogram, InMemoryMetrics, InstrumentDescriptor, MetricsBackend, ObservableCallback,
    ObservableHandle, UpDownCounter,
};
use otel_selfobs::{
    BatchConfig, BatchProcessor, ExportOutcome, Exporter, InstanceRegistry, ProcessorContext,
    Signal,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Minimal record type flowing through the processors under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub id: u32,
    pub body: String,
}

impl TestRecord {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            body: format!("record-{id}"),
        }
    }
}

/// Batch settings with a long scheduled delay so only explicit triggers export.
pub fn manual_config(queue: usize, batch: usize) -> BatchConfig {
    BatchConfig {
        max_queue_size: queue,
        max_export_batch_size: batch,
        scheduled_delay: Duration::from_secs(3600),
        export_timeout: Duration::from_secs(30),
    }
}

/// Build a processor with its own registry and an optional backend.
pub fn build_processor<E>(
    signal: Signal,
    exporter: E,
    config: BatchConfig,
    backend: Option<Arc<dyn MetricsBackend>>,
) -> (BatchProcessor<TestRecord>, Arc<InstanceRegistry>)
where
    E: Exporter<TestRecord> + 'static,
{
    let registry = Arc::new(InstanceRegistry::new());
    let processor = BatchProcessor::builder(signal, exporter)
        .with_config(config)
        .with_context(ProcessorContext::new(Arc::clone(&registry), backend))
        .build()
        .expect("processor should build");
    (processor, registry)
}

/// Shorthand for handing an in-memory backend to a processor.
pub fn backend(metrics: &InMemoryMetrics) -> Option<Arc<dyn MetricsBackend>> {
    Some(Arc::new(metrics.clone()))
}

/// Shared counters observed by [`SlowExporter`].
#[derive(Debug, Default)]
pub struct ExportTracker {
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub exported: AtomicUsize,
    pub calls: AtomicUsize,
}

/// Exporter that sleeps for `delay` per batch and tracks overlapping calls.
pub struct SlowExporter {
    delay: Duration,
    tracker: Arc<ExportTracker>,
}

impl SlowExporter {
    pub fn new(delay: Duration) -> (Self, Arc<ExportTracker>) {
        let tracker = Arc::new(ExportTracker::default());
        (
            Self {
                delay,
                tracker: Arc::clone(&tracker),
            },
            tracker,
        )
    }
}

#[async_trait]
impl Exporter<TestRecord> for SlowExporter {
    async fn export(&mut self, batch: Vec<TestRecord>, _timeout: Duration) -> ExportOutcome {
        let current = self.tracker.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.tracker.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.tracker.exported.fetch_add(batch.len(), Ordering::SeqCst);
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
        ExportOutcome::Success
    }
}

/// Exporter that panics on every export.
pub struct PanickingExporter;

#[async_trait]
impl Exporter<TestRecord> for PanickingExporter {
    async fn export(&mut self, batch: Vec<TestRecord>, _timeout: Duration) -> ExportOutcome {
        panic!("exporter blew up on {} records", batch.len());
    }
}

/// Backend whose every call panics.
pub struct PanickingBackend;

impl MetricsBackend for PanickingBackend {
    fn create_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Counter>, MetricsError> {
        panic!("create_counter {}", descriptor.name);
    }

    fn create_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn UpDownCounter>, MetricsError> {
        panic!("create_up_down_counter {}", descriptor.name);
    }

    fn create_observable_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
        _callback: ObservableCallback,
    ) -> Result<Box<dyn ObservableHandle>, MetricsError> {
        panic!("create_observable_up_down_counter {}", descriptor.name);
    }

    fn create_histogram(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Histogram>, MetricsError> {
        panic!("create_histogram {}", descriptor.name);
    }
}

/// Backend that refuses observable registration but hands out counters that panic.
pub struct BrokenInstrumentsBackend;

struct PanickingCounter;

impl Counter for PanickingCounter {
    fn add(&self, _value: u64, _attributes: &[KeyValue]) {
        panic!("counter add");
    }
}

impl MetricsBackend for BrokenInstrumentsBackend {
    fn create_counter(
        &self,
        _descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Counter>, MetricsError> {
        Ok(Arc::new(PanickingCounter))
    }

    fn create_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn UpDownCounter>, MetricsError> {
        Err(MetricsError::registration(descriptor.name, "not supported"))
    }

    fn create_observable_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
        _callback: ObservableCallback,
    ) -> Result<Box<dyn ObservableHandle>, MetricsError> {
        Err(MetricsError::registration(descriptor.name, "meter closed"))
    }

    fn create_histogram(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Histogram>, MetricsError> {
        Err(MetricsError::registration(descriptor.name, "not supported"))
    }
}
