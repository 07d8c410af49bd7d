//! Self-metrics for one batching processor instance.
//!
//! The processor talks to a single [`ProcessorMetrics`] capability chosen once
//! at construction: [`BoundProcessorMetrics`] when a backend was discovered,
//! [`NoopProcessorMetrics`] otherwise. Nothing here can fail from the
//! processor's point of view; a backend error during registration turns the
//! binding inert for the rest of the instance's life.

use crate::core::Signal;
use crate::metrics::backend::guarded;
use crate::metrics::{semconv, Counter, MetricsBackend, Observation, ObservableHandle};
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reads the live queue length; `None` once the processor is gone.
pub type SizeReader = Arc<dyn Fn() -> Option<usize> + Send + Sync>;

/// Observation hooks the batching processor calls.
pub trait ProcessorMetrics: Send + Sync {
    /// Register the queue size and capacity observables.
    fn bind_queue_observables(
        &self,
        size_reader: SizeReader,
        capacity: usize,
        component_name: &str,
    );

    /// Count records whose export finished, tagging failures with `error_type`.
    fn record_processed(&self, count: usize, component_name: &str, error_type: Option<&str>);

    /// Unregister the observables. Later calls to any method are no-ops.
    fn unbind(&self);

    /// Whether measurements can currently reach a backend
    fn is_active(&self) -> bool;
}

/// Factory choosing the capability for a processor.
pub struct SelfMetricsBinding;

impl SelfMetricsBinding {
    /// Bind to `backend` if present, otherwise hand out the no-op capability.
    pub fn for_processor(
        backend: Option<Arc<dyn MetricsBackend>>,
        signal: Signal,
    ) -> Arc<dyn ProcessorMetrics> {
        match backend {
            Some(backend) => match BoundProcessorMetrics::new(backend, signal) {
                Some(bound) => Arc::new(bound),
                None => Arc::new(NoopProcessorMetrics),
            },
            None => Arc::new(NoopProcessorMetrics),
        }
    }
}

/// Capability used when no backend is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProcessorMetrics;

impl ProcessorMetrics for NoopProcessorMetrics {
    fn bind_queue_observables(
        &self,
        _size_reader: SizeReader,
        _capacity: usize,
        _component_name: &str,
    ) {
    }

    fn record_processed(&self, _count: usize, _component_name: &str, _error_type: Option<&str>) {}

    fn unbind(&self) {}

    fn is_active(&self) -> bool {
        false
    }
}

/// Capability backed by a real metrics backend.
pub struct BoundProcessorMetrics {
    backend: Arc<dyn MetricsBackend>,
    signal: Signal,
    processed: Arc<dyn Counter>,
    observables: Mutex<Vec<Box<dyn ObservableHandle>>>,
    active: Arc<AtomicBool>,
}

impl BoundProcessorMetrics {
    /// Create the processed counter. Returns `None` if the backend refuses.
    pub fn new(backend: Arc<dyn MetricsBackend>, signal: Signal) -> Option<Self> {
        let descriptor = semconv::processor_processed(signal);
        let processed =
            guarded("create processed counter", || backend.create_counter(&descriptor))?;

        Some(Self {
            backend,
            signal,
            processed,
            observables: Mutex::new(Vec::new()),
            active: Arc::new(AtomicBool::new(true)),
        })
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        let handles = std::mem::take(&mut *self.observables.lock());
        for handle in handles {
            guarded("unregister observable", || {
                handle.unregister();
                Ok(())
            });
        }
    }
}

impl ProcessorMetrics for BoundProcessorMetrics {
    fn bind_queue_observables(
        &self,
        size_reader: SizeReader,
        capacity: usize,
        component_name: &str,
    ) {
        if !self.is_active() {
            return;
        }

        let attributes = vec![KeyValue::new(
            semconv::OTEL_COMPONENT_NAME,
            component_name.to_string(),
        )];

        let size_active = Arc::clone(&self.active);
        let size_attributes = attributes.clone();
        let size_callback = Arc::new(move || {
            if !size_active.load(Ordering::Acquire) {
                return Vec::new();
            }
            match size_reader() {
                Some(len) => vec![Observation {
                    value: len as i64,
                    attributes: size_attributes.clone(),
                }],
                None => Vec::new(),
            }
        });

        let capacity_active = Arc::clone(&self.active);
        let capacity_callback = Arc::new(move || {
            if !capacity_active.load(Ordering::Acquire) {
                return Vec::new();
            }
            vec![Observation {
                value: capacity as i64,
                attributes: attributes.clone(),
            }]
        });

        let size_descriptor = semconv::processor_queue_size(self.signal);
        let capacity_descriptor = semconv::processor_queue_capacity(self.signal);

        let size_handle = guarded("register queue size observable", || {
            self.backend
                .create_observable_up_down_counter(&size_descriptor, size_callback)
        });
        let capacity_handle = guarded("register queue capacity observable", || {
            self.backend
                .create_observable_up_down_counter(&capacity_descriptor, capacity_callback)
        });

        let failed = size_handle.is_none() || capacity_handle.is_none();
        self.observables
            .lock()
            .extend(size_handle.into_iter().chain(capacity_handle));

        if failed {
            self.deactivate();
        }
    }

    fn record_processed(&self, count: usize, component_name: &str, error_type: Option<&str>) {
        if !self.is_active() {
            return;
        }

        let mut attributes = Vec::with_capacity(2);
        attributes.push(KeyValue::new(semconv::OTEL_COMPONENT_NAME, component_name.to_string()));
        if let Some(error_type) = error_type {
            attributes.push(KeyValue::new(semconv::ERROR_TYPE, error_type.to_string()));
        }

        let recorded = guarded("record processed", || {
            self.processed.add(count as u64, &attributes);
            Ok(())
        });
        if recorded.is_none() {
            self.deactivate();
        }
    }

    fn unbind(&self) {
        self.deactivate();
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetrics;
    use std::sync::atomic::AtomicUsize;

    fn bound(backend: &InMemoryMetrics) -> Arc<dyn ProcessorMetrics> {
        SelfMetricsBinding::for_processor(Some(Arc::new(backend.clone())), Signal::Span)
    }

    #[test]
    fn test_missing_backend_yields_noop() {
        let metrics = SelfMetricsBinding::for_processor(None, Signal::Log);
        assert!(!metrics.is_active());
        metrics.bind_queue_observables(Arc::new(|| Some(1)), 10, "batching_log_processor/0");
        metrics.record_processed(3, "batching_log_processor/0", None);
        metrics.unbind();
    }

    #[test]
    fn test_processed_omits_error_type_on_success() {
        let backend = InMemoryMetrics::new();
        let metrics = bound(&backend);

        metrics.record_processed(3, "batching_span_processor/0", None);
        metrics.record_processed(2, "batching_span_processor/0", Some("timeout"));

        let recorded = backend.measurements(semconv::OTEL_SDK_PROCESSOR_SPAN_PROCESSED);
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].value, 3.0);
        assert_eq!(recorded[0].attributes.len(), 1);
        assert_eq!(recorded[1].attribute(semconv::ERROR_TYPE).as_deref(), Some("timeout"));
    }

    #[test]
    fn test_observables_read_live_size_until_unbound() {
        let backend = InMemoryMetrics::new();
        let metrics = bound(&backend);
        let size = Arc::new(AtomicUsize::new(4));
        let reader_size = Arc::clone(&size);

        metrics.bind_queue_observables(
            Arc::new(move || Some(reader_size.load(Ordering::SeqCst))),
            16,
            "batching_span_processor/2",
        );

        let name = "batching_span_processor/2";
        let size_metric = semconv::OTEL_SDK_PROCESSOR_SPAN_QUEUE_SIZE;
        let capacity_metric = semconv::OTEL_SDK_PROCESSOR_SPAN_QUEUE_CAPACITY;
        assert_eq!(backend.observed_value(size_metric, name), Some(4));
        size.store(9, Ordering::SeqCst);
        assert_eq!(backend.observed_value(size_metric, name), Some(9));
        assert_eq!(backend.observed_value(capacity_metric, name), Some(16));

        metrics.unbind();
        assert!(backend.observe(semconv::OTEL_SDK_PROCESSOR_SPAN_QUEUE_SIZE).is_empty());
        metrics.record_processed(1, name, None);
        assert!(backend.measurements(semconv::OTEL_SDK_PROCESSOR_SPAN_PROCESSED).is_empty());
    }
}
