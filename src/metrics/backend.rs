//! The metrics backend contract consumed by the self-metrics binding.
//!
//! A backend hands out instruments; the binding never assumes that any call
//! on it succeeds. Every call made by this crate goes through [`guarded`],
//! which turns both `Err` returns and panics into `None`.

use crate::core::MetricsError;
use once_cell::sync::Lazy;
use opentelemetry::KeyValue;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

static GLOBAL_BACKEND: Lazy<RwLock<Option<Arc<dyn MetricsBackend>>>> =
    Lazy::new(|| RwLock::new(None));

/// Instrument flavours a backend can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Monotonic sum, pushed with `add`
    Counter,
    /// Non-monotonic sum, pushed with `add`
    UpDownCounter,
    /// Non-monotonic sum, pulled through a callback
    ObservableUpDownCounter,
    /// Distribution, pushed with `record`
    Histogram,
}

/// Static description of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentDescriptor {
    /// Stable metric name
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// UCUM unit
    pub unit: &'static str,
    /// Instrument flavour
    pub kind: InstrumentKind,
}

impl InstrumentDescriptor {
    /// Create a descriptor
    pub const fn new(
        name: &'static str,
        description: &'static str,
        unit: &'static str,
        kind: InstrumentKind,
    ) -> Self {
        Self {
            name,
            description,
            unit,
            kind,
        }
    }
}

/// One value produced by an observable callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Observed value
    pub value: i64,
    /// Attributes attached to the value
    pub attributes: Vec<KeyValue>,
}

/// Callback pulled by the backend on its own collection schedule.
///
/// Must be cheap and must not block.
pub type ObservableCallback = Arc<dyn Fn() -> Vec<Observation> + Send + Sync>;

/// Monotonic counter.
pub trait Counter: Send + Sync {
    /// Add a non-negative increment
    fn add(&self, value: u64, attributes: &[KeyValue]);
}

/// Non-monotonic counter.
pub trait UpDownCounter: Send + Sync {
    /// Add a signed increment
    fn add(&self, value: i64, attributes: &[KeyValue]);
}

/// Value distribution.
pub trait Histogram: Send + Sync {
    /// Record one value
    fn record(&self, value: f64, attributes: &[KeyValue]);
}

/// Registration of an observable callback.
pub trait ObservableHandle: Send + Sync {
    /// Stop producing observations. Calling it twice is harmless.
    fn unregister(&self);
}

/// A source of instruments, e.g. a meter provider.
pub trait MetricsBackend: Send + Sync {
    /// Create a monotonic counter
    fn create_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Counter>, MetricsError>;

    /// Create an up-down counter driven by direct `add` calls
    fn create_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn UpDownCounter>, MetricsError>;

    /// Create an up-down counter whose value comes from `callback`
    fn create_observable_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
        callback: ObservableCallback,
    ) -> Result<Box<dyn ObservableHandle>, MetricsError>;

    /// Create a histogram
    fn create_histogram(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Histogram>, MetricsError>;
}

/// Make `backend` the process-wide backend returned by [`discover_backend`].
pub fn install_global_backend(backend: Arc<dyn MetricsBackend>) {
    *GLOBAL_BACKEND.write() = Some(backend);
}

/// Remove the process-wide backend, returning the previous one.
pub fn uninstall_global_backend() -> Option<Arc<dyn MetricsBackend>> {
    GLOBAL_BACKEND.write().take()
}

/// Look up the process-wide metrics backend.
///
/// Returns `None` when no backend is installed or the lookup fails. Never panics.
///
/// Only backends installed with [`install_global_backend`] are found. A meter
/// provider set through `opentelemetry::global` is not picked up on its own;
/// the host has to bridge it once at startup:
///
/// ```no_run
/// use otel_selfobs::metrics::{install_global_backend, OtelMetricsBackend};
/// use std::sync::Arc;
///
/// install_global_backend(Arc::new(OtelMetricsBackend::global()));
/// ```
pub fn discover_backend() -> Option<Arc<dyn MetricsBackend>> {
    guarded("discover_backend", || {
        GLOBAL_BACKEND.read().as_ref().map(Arc::clone).ok_or(MetricsError::Unavailable)
    })
}

fn log_swallowed(operation: &'static str, error: &MetricsError) {
    tracing::debug!(
        target: "otel_selfobs::metrics",
        operation,
        error = %error,
        "Self-metrics operation failed"
    );
}

/// Run a backend operation, absorbing errors and panics.
pub(crate) fn guarded<T, F>(operation: &'static str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T, MetricsError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(MetricsError::Unavailable)) => None,
        Ok(Err(e)) => {
            log_swallowed(operation, &e);
            None
        },
        Err(_) => {
            log_swallowed(operation, &MetricsError::BackendPanicked(operation));
            None
        },
    }
}
