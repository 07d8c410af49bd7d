//! Recording metrics backend.
//!
//! Keeps every measurement in memory and lets callers pull observable
//! instruments on demand, which makes it the natural backend for tests and
//! for debugging a pipeline without a real meter provider.

use crate::core::MetricsError;
use crate::metrics::{
    semconv, Counter, Histogram, InstrumentDescriptor, InstrumentKind, MetricsBackend,
    Observation, ObservableCallback, ObservableHandle, UpDownCounter,
};
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single pushed measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMeasurement {
    /// Instrument name
    pub instrument: &'static str,
    /// Instrument flavour
    pub kind: InstrumentKind,
    /// Value as pushed (counters are widened to `f64`)
    pub value: f64,
    /// Attributes attached to the measurement
    pub attributes: Vec<KeyValue>,
}

impl RecordedMeasurement {
    /// String value of an attribute, if present
    pub fn attribute(&self, key: &str) -> Option<String> {
        find_attribute(&self.attributes, key)
    }
}

/// Look up an attribute value by key.
pub fn find_attribute(attributes: &[KeyValue], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.to_string())
}

struct RegisteredObservable {
    descriptor: InstrumentDescriptor,
    callback: ObservableCallback,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct MemoryState {
    descriptors: Vec<InstrumentDescriptor>,
    measurements: Vec<RecordedMeasurement>,
    observables: Vec<RegisteredObservable>,
}

/// In-memory [`MetricsBackend`].
#[derive(Clone, Default)]
pub struct InMemoryMetrics {
    state: Arc<Mutex<MemoryState>>,
}

impl std::fmt::Debug for InMemoryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryMetrics")
            .field("instruments", &state.descriptors.len())
            .field("measurements", &state.measurements.len())
            .finish()
    }
}

impl InMemoryMetrics {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptors of every instrument created so far
    pub fn instruments(&self) -> Vec<InstrumentDescriptor> {
        self.state.lock().descriptors.clone()
    }

    /// Pushed measurements for one instrument, in recording order
    pub fn measurements(&self, instrument: &str) -> Vec<RecordedMeasurement> {
        self.state
            .lock()
            .measurements
            .iter()
            .filter(|m| m.instrument == instrument)
            .cloned()
            .collect()
    }

    /// Sum of pushed values for an instrument
    pub fn sum(&self, instrument: &str) -> f64 {
        self.measurements(instrument).iter().map(|m| m.value).sum()
    }

    /// Invoke the callbacks of every active observable named `instrument`.
    ///
    /// Callbacks run outside the backend lock, as a real collector would.
    pub fn observe(&self, instrument: &str) -> Vec<Observation> {
        let callbacks: Vec<ObservableCallback> = self
            .state
            .lock()
            .observables
            .iter()
            .filter(|o| o.descriptor.name == instrument && o.active.load(Ordering::Acquire))
            .map(|o| Arc::clone(&o.callback))
            .collect();

        callbacks.iter().flat_map(|callback| callback()).collect()
    }

    /// Observed value for the observation tagged with `component_name`
    pub fn observed_value(&self, instrument: &str, component_name: &str) -> Option<i64> {
        self.observe(instrument)
            .into_iter()
            .find(|o| {
                let name = find_attribute(&o.attributes, semconv::OTEL_COMPONENT_NAME);
                name.as_deref() == Some(component_name)
            })
            .map(|o| o.value)
    }

    /// Number of observables still registered and active
    pub fn active_observables(&self) -> usize {
        self.state
            .lock()
            .observables
            .iter()
            .filter(|o| o.active.load(Ordering::Acquire))
            .count()
    }

    fn push(
        &self,
        instrument: &'static str,
        kind: InstrumentKind,
        value: f64,
        attributes: &[KeyValue],
    ) {
        self.state.lock().measurements.push(RecordedMeasurement {
            instrument,
            kind,
            value,
            attributes: attributes.to_vec(),
        });
    }

    fn remember(&self, descriptor: &InstrumentDescriptor) {
        self.state.lock().descriptors.push(*descriptor);
    }
}

struct MemoryInstrument {
    backend: InMemoryMetrics,
    descriptor: InstrumentDescriptor,
}

impl Counter for MemoryInstrument {
    fn add(&self, value: u64, attributes: &[KeyValue]) {
        self.backend
            .push(self.descriptor.name, self.descriptor.kind, value as f64, attributes);
    }
}

impl UpDownCounter for MemoryInstrument {
    fn add(&self, value: i64, attributes: &[KeyValue]) {
        self.backend
            .push(self.descriptor.name, self.descriptor.kind, value as f64, attributes);
    }
}

impl Histogram for MemoryInstrument {
    fn record(&self, value: f64, attributes: &[KeyValue]) {
        self.backend
            .push(self.descriptor.name, self.descriptor.kind, value, attributes);
    }
}

struct MemoryObservable {
    active: Arc<AtomicBool>,
}

impl ObservableHandle for MemoryObservable {
    fn unregister(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl InMemoryMetrics {
    fn instrument(&self, descriptor: &InstrumentDescriptor) -> Arc<MemoryInstrument> {
        self.remember(descriptor);
        Arc::new(MemoryInstrument {
            backend: self.clone(),
            descriptor: *descriptor,
        })
    }
}

impl MetricsBackend for InMemoryMetrics {
    fn create_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Counter>, MetricsError> {
        Ok(self.instrument(descriptor))
    }

    fn create_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn UpDownCounter>, MetricsError> {
        Ok(self.instrument(descriptor))
    }

    fn create_observable_up_down_counter(
        &self,
        descriptor: &InstrumentDescriptor,
        callback: ObservableCallback,
    ) -> Result<Box<dyn ObservableHandle>, MetricsError> {
        self.remember(descriptor);
        let active = Arc::new(AtomicBool::new(true));
        self.state.lock().observables.push(RegisteredObservable {
            descriptor: *descriptor,
            callback,
            active: Arc::clone(&active),
        });
        Ok(Box::new(MemoryObservable { active }))
    }

    fn create_histogram(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<dyn Histogram>, MetricsError> {
        Ok(self.instrument(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Signal;
    use crate::metrics::semconv;

    #[test]
    fn test_counter_measurements_are_recorded() {
        let backend = InMemoryMetrics::new();
        let descriptor = semconv::processor_processed(Signal::Log);
        let counter = backend.create_counter(&descriptor).unwrap();

        counter.add(2, &[KeyValue::new(semconv::OTEL_COMPONENT_NAME, "batching_log_processor/0")]);
        counter.add(5, &[KeyValue::new(semconv::ERROR_TYPE, "timeout")]);

        assert_eq!(backend.sum(descriptor.name), 7.0);
        let recorded = backend.measurements(descriptor.name);
        assert_eq!(recorded[0].attribute(semconv::ERROR_TYPE), None);
        assert_eq!(recorded[1].attribute(semconv::ERROR_TYPE).as_deref(), Some("timeout"));
        assert_eq!(backend.instruments(), vec![descriptor]);
    }

    #[test]
    fn test_unregistered_observable_is_not_pulled() {
        let backend = InMemoryMetrics::new();
        let descriptor = semconv::processor_queue_size(Signal::Span);
        let handle = backend
            .create_observable_up_down_counter(
                &descriptor,
                Arc::new(|| {
                    vec![Observation {
                        value: 4,
                        attributes: vec![KeyValue::new(semconv::OTEL_COMPONENT_NAME, "p/0")],
                    }]
                }),
            )
            .unwrap();

        assert_eq!(backend.observed_value(descriptor.name, "p/0"), Some(4));
        handle.unregister();
        assert!(backend.observe(descriptor.name).is_empty());
        assert_eq!(backend.active_observables(), 0);
    }
}
