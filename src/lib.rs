//! otel-selfobs - batching export engine with self-observability.
//!
//! Telemetry records (finished spans, log records) are buffered in a bounded
//! queue and handed to an exporter in batches, either on a schedule or once a
//! full batch is available. Each processor reports its own health through the
//! OpenTelemetry semantic-convention SDK metrics:
//!
//! - `otel.sdk.processor.{span,log}.queue.size` / `queue.capacity`
//! - `otel.sdk.processor.{span,log}.processed`, tagged with `error.type` on failure
//! - `otel.sdk.exporter.*` via [`export::InstrumentedExporter`]
//!
//! # Architecture
//!
//! - `core`: configuration, errors, instance registry and shared types
//! - `processor`: bounded queue and the batching engine
//! - `export`: the exporter contract and an in-memory exporter
//! - `metrics`: the metrics backend contract, the OpenTelemetry adapter and
//!   the per-processor binding
//! - `logging`: subscriber setup for diagnostic output
//!
//! Metrics are strictly optional. Without a backend, or with a backend that
//! errors or panics, the processor behaves exactly the same.
//!
//! Processors look for a backend installed with
//! [`metrics::install_global_backend`] when they are built. A meter provider
//! registered with `opentelemetry::global` is not used unless the host
//! installs [`metrics::OtelMetricsBackend::global`] as that backend.
//!
//! # Example
//!
//! ```no_run
//! use otel_selfobs::export::InMemoryExporter;
//! use otel_selfobs::metrics::{install_global_backend, OtelMetricsBackend};
//! use otel_selfobs::{BatchProcessor, Signal};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Report through whatever provider `opentelemetry::global` holds.
//!     install_global_backend(Arc::new(OtelMetricsBackend::global()));
//!
//!     let exporter = InMemoryExporter::<String>::new();
//!     let processor = BatchProcessor::builder(Signal::Log, exporter).build()?;
//!
//!     processor.enqueue("hello".to_string());
//!     processor.shutdown(Duration::from_secs(5)).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod core;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod processor;

// Re-export core types for convenience
pub use crate::core::{
    BatchConfig, Config, ExportOutcome, InstanceRegistry, ProcessorState, Result, SelfObsError,
    Signal,
};
pub use crate::export::Exporter;
pub use crate::processor::{BatchProcessor, ProcessorContext, ProcessorStats};
