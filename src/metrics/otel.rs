//! [`MetricsBackend`] implemented on top of the OpenTelemetry metrics API.

use crate::core::MetricsError;
use crate::metrics::{
    Counter, Histogram, InstrumentDescriptor, MetricsBackend, ObservableCallback, ObservableHandle,
    UpDownCounter,
};
use opentelemetry::metrics::{self as otel, Meter};
use opentelemetry::KeyValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Meter name used when the backend is built from the global provider.
pub const METER_NAME: &str = "otel-selfobs";

/// Backend that creates instruments from an OpenTelemetry [`Meter`].
#[derive(Clone)]
pub struct OtelMetricsBackend {
    meter: Meter,
}

impl std::fmt::Debug for OtelMetricsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtelMetricsBackend").finish_non_exhaustive()
    }
}

impl OtelMetricsBackend {
    /// Wrap an existing meter
    pub fn new(meter: Meter) -> Self {
        Self { meter }
    }

    /// Use the meter provider installed with `opentelemetry::global`
    pub fn global() -> Self {
        Self::new(opentelemetry::global::meter(METER_NAME))
    }
}

struct OtelCounter(otel::Counter<u64>);

impl Counter for OtelCounter {
    fn add(&self, value: u64, attributes: &[KeyValue]) {
        self.0.add(value, attributes);
    }
}

struct OtelUpDownCounter(otel::UpDownCounter<i64>);

impl UpDownCounter for OtelUpDownCounter {
    fn add(&self, value: i64, attributes: &[KeyValue]) {
        self.0.add(value, attributes);
    }
}

struct OtelHistogram(otel::Histogram<f64>);

impl Histogram for OtelHistogram {
    fn record(&self, value: f64, attributes: &[KeyValue]) {
        self.0.record(value, attributes);
    }
}

/// The SDK keeps callbacks for the lifetime of the meter, so unregistering
/// only silences the callback.
struct OtelObservable {
    _instrument: otel::ObservableUpDownCounter<i64>,
    active: Arc<AtomicBool>,
}

impl ObservableHandle for OtelObservable {
    fn unregister(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl MetricsBackend for OtelMetricsBackend {
    fn create_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Counter>, MetricsError> {
        let counter = self
            .meter
            .u64_counter(descriptor.name)
            .with_description(descriptor.description)
            .with_unit(descriptor.unit)
            .build();
        Ok(Arc::new(OtelCounter(counter)))
    }

    fn create_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn UpDownCounter>, MetricsError> {
        let counter = self
            .meter
            .i64_up_down_counter(descriptor.name)
            .with_description(descriptor.description)
            .with_unit(descriptor.unit)
            .build();
        Ok(Arc::new(OtelUpDownCounter(counter)))
    }

    fn create_observable_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
        callback: ObservableCallback,
    ) -> Result<Box<dyn ObservableHandle>, MetricsError> {
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);
        let instrument = self
            .meter
            .i64_observable_up_down_counter(descriptor.name)
            .with_description(descriptor.description)
            .with_unit(descriptor.unit)
            .with_callback(move |observer| {
                if !flag.load(Ordering::Acquire) {
                    return;
                }
                for observation in callback() {
                    observer.observe(observation.value, &observation.attributes);
                }
            })
            .build();
        Ok(Box::new(OtelObservable {
            _instrument: instrument,
            active,
        }))
    }

    fn create_histogram(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Histogram>, MetricsError> {
        let histogram = self
            .meter
            .f64_histogram(descriptor.name)
            .with_description(descriptor.description)
            .with_unit(descriptor.unit)
            .build();
        Ok(Arc::new(OtelHistogram(histogram)))
    }
}
