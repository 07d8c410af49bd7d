//! Exporter and span-lifecycle self-metrics.

use crate::core::Signal;
use crate::metrics::backend::guarded;
use crate::metrics::{semconv, Counter, Histogram, MetricsBackend, UpDownCounter};
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::time::Duration;

fn component_attributes(component_name: &str, error_type: Option<&str>) -> Vec<KeyValue> {
    let mut attributes = vec![KeyValue::new(
        semconv::OTEL_COMPONENT_NAME,
        component_name.to_string(),
    )];
    if let Some(error_type) = error_type {
        attributes.push(KeyValue::new(semconv::ERROR_TYPE, error_type.to_string()));
    }
    attributes
}

/// Instruments recorded around each exporter call.
///
/// Each instrument is optional: whichever the backend refused to create is
/// skipped.
#[derive(Clone, Default)]
pub struct ExporterMetrics {
    exported: Option<Arc<dyn Counter>>,
    duration: Option<Arc<dyn Histogram>>,
}

impl ExporterMetrics {
    /// Create exporter instruments, or an inert set when `backend` is `None`.
    pub fn new(backend: Option<&Arc<dyn MetricsBackend>>, signal: Signal) -> Self {
        let Some(backend) = backend else {
            return Self::default();
        };

        let exported_descriptor = semconv::exporter_exported(signal);
        let duration_descriptor = semconv::exporter_operation_duration();
        Self {
            exported: guarded("create exported counter", || {
                backend.create_counter(&exported_descriptor)
            }),
            duration: guarded("create export duration histogram", || {
                backend.create_histogram(&duration_descriptor)
            }),
        }
    }

    /// Record one finished export of `count` records.
    pub fn record_export(
        &self,
        count: usize,
        elapsed: Duration,
        component_name: &str,
        error_type: Option<&str>,
    ) {
        if self.exported.is_none() && self.duration.is_none() {
            return;
        }

        let attributes = component_attributes(component_name, error_type);
        if let Some(exported) = &self.exported {
            guarded("record exported", || {
                exported.add(count as u64, &attributes);
                Ok(())
            });
        }
        if let Some(duration) = &self.duration {
            guarded("record export duration", || {
                duration.record(elapsed.as_secs_f64(), &attributes);
                Ok(())
            });
        }
    }
}

/// Started / live span counters for a tracer.
#[derive(Clone, Default)]
pub struct SpanLifecycleMetrics {
    started: Option<Arc<dyn Counter>>,
    live: Option<Arc<dyn UpDownCounter>>,
    attributes: Vec<KeyValue>,
}

impl SpanLifecycleMetrics {
    /// Create the lifecycle instruments for the tracer named `component_name`.
    pub fn new(backend: Option<&Arc<dyn MetricsBackend>>, component_name: &str) -> Self {
        let Some(backend) = backend else {
            return Self::default();
        };

        let started_descriptor = semconv::span_started();
        let live_descriptor = semconv::span_live();
        Self {
            started: guarded("create span started counter", || {
                backend.create_counter(&started_descriptor)
            }),
            live: guarded("create span live counter", || {
                backend.create_up_down_counter(&live_descriptor)
            }),
            attributes: component_attributes(component_name, None),
        }
    }

    /// A span was started.
    pub fn on_start(&self) {
        if let Some(started) = &self.started {
            guarded("record span started", || {
                started.add(1, &self.attributes);
                Ok(())
            });
        }
        if let Some(live) = &self.live {
            guarded("record span live", || {
                live.add(1, &self.attributes);
                Ok(())
            });
        }
    }

    /// A span previously reported through [`on_start`](Self::on_start) ended.
    pub fn on_end(&self) {
        if let Some(live) = &self.live {
            guarded("record span live", || {
                live.add(-1, &self.attributes);
                Ok(())
            });
        }
    }
}
