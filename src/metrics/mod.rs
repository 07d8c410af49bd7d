//! Self-observability metrics for the batching pipeline.
//!
//! - `backend`: the instrument contract and process-wide backend discovery
//! - `binding`: per-processor queue and processed-count instrumentation
//! - `lifecycle`: exporter and span lifecycle instruments
//! - `otel`: adapter over an OpenTelemetry `Meter`
//! - `memory`: recording backend
//! - `semconv`: metric names, attribute keys and units

pub mod backend;
pub mod binding;
pub mod lifecycle;
pub mod memory;
pub mod otel;
pub mod semconv;

pub use backend::{
    discover_backend, install_global_backend, uninstall_global_backend, Counter, Histogram,
    InstrumentDescriptor, InstrumentKind, MetricsBackend, ObservableCallback, ObservableHandle,
    Observation, UpDownCounter,
};
pub use binding::{
    BoundProcessorMetrics, NoopProcessorMetrics, ProcessorMetrics, SelfMetricsBinding, SizeReader,
};
pub use lifecycle::{ExporterMetrics, SpanLifecycleMetrics};
pub use memory::{find_attribute, InMemoryMetrics, RecordedMeasurement};
pub use otel::OtelMetricsBackend;
