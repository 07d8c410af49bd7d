//! Metric identifiers, attribute keys and units for SDK self-observability.
//!
//! All names carry stability "development" in the OpenTelemetry semantic
//! conventions.

use crate::core::Signal;
use crate::metrics::{InstrumentDescriptor, InstrumentKind};

/// Attribute: registry-issued instance name, e.g. `batching_span_processor/0`
pub const OTEL_COMPONENT_NAME: &str = "otel.component.name";
/// Attribute: error class, present only when an operation failed
pub const ERROR_TYPE: &str = "error.type";

/// Log records currently queued in a batching log processor
pub const OTEL_SDK_PROCESSOR_LOG_QUEUE_SIZE: &str = "otel.sdk.processor.log.queue.size";
/// Maximum queue size of a batching log processor
pub const OTEL_SDK_PROCESSOR_LOG_QUEUE_CAPACITY: &str = "otel.sdk.processor.log.queue.capacity";
/// Log records whose export finished, tagged with `error.type` on failure
pub const OTEL_SDK_PROCESSOR_LOG_PROCESSED: &str = "otel.sdk.processor.log.processed";
/// Spans currently queued in a batching span processor
pub const OTEL_SDK_PROCESSOR_SPAN_QUEUE_SIZE: &str = "otel.sdk.processor.span.queue.size";
/// Maximum queue size of a batching span processor
pub const OTEL_SDK_PROCESSOR_SPAN_QUEUE_CAPACITY: &str = "otel.sdk.processor.span.queue.capacity";
/// Spans whose export finished, tagged with `error.type` on failure
pub const OTEL_SDK_PROCESSOR_SPAN_PROCESSED: &str = "otel.sdk.processor.span.processed";
/// Spans handed to an exporter
pub const OTEL_SDK_EXPORTER_SPAN_EXPORTED: &str = "otel.sdk.exporter.span.exported";
/// Log records handed to an exporter
pub const OTEL_SDK_EXPORTER_LOG_EXPORTED: &str = "otel.sdk.exporter.log.exported";
/// Duration of one export call, in seconds
pub const OTEL_SDK_EXPORTER_OPERATION_DURATION: &str = "otel.sdk.exporter.operation.duration";
/// Spans started
pub const OTEL_SDK_SPAN_STARTED: &str = "otel.sdk.span.started";
/// Spans started and not yet ended
pub const OTEL_SDK_SPAN_LIVE: &str = "otel.sdk.span.live";

/// Unit for span counts
pub const UNIT_SPAN: &str = "{span}";
/// Unit for log record counts
pub const UNIT_LOG_RECORD: &str = "{log_record}";
/// Unit for durations
pub const UNIT_SECONDS: &str = "s";

fn record_unit(signal: Signal) -> &'static str {
    match signal {
        Signal::Span => UNIT_SPAN,
        Signal::Log => UNIT_LOG_RECORD,
    }
}

/// Observable up-down counter: records currently queued.
pub fn processor_queue_size(signal: Signal) -> InstrumentDescriptor {
    let (name, description) = match signal {
        Signal::Span => (
            OTEL_SDK_PROCESSOR_SPAN_QUEUE_SIZE,
            "The number of spans in the queue of a given instance of an SDK span processor.",
        ),
        Signal::Log => (
            OTEL_SDK_PROCESSOR_LOG_QUEUE_SIZE,
            "The number of log records in the queue of a given instance of an SDK log processor.",
        ),
    };
    InstrumentDescriptor::new(
        name,
        description,
        record_unit(signal),
        InstrumentKind::ObservableUpDownCounter,
    )
}

/// Observable up-down counter: maximum number of queued records.
pub fn processor_queue_capacity(signal: Signal) -> InstrumentDescriptor {
    let (name, description) = match signal {
        Signal::Span => (
            OTEL_SDK_PROCESSOR_SPAN_QUEUE_CAPACITY,
            "The maximum number of spans the queue of a given instance of an SDK span processor can hold.",
        ),
        Signal::Log => (
            OTEL_SDK_PROCESSOR_LOG_QUEUE_CAPACITY,
            "The maximum number of log records the queue of a given instance of an SDK log processor can hold.",
        ),
    };
    InstrumentDescriptor::new(
        name,
        description,
        record_unit(signal),
        InstrumentKind::ObservableUpDownCounter,
    )
}

/// Counter: records handed to the exporter, with `error.type` on failure.
pub fn processor_processed(signal: Signal) -> InstrumentDescriptor {
    let (name, description) = match signal {
        Signal::Span => (
            OTEL_SDK_PROCESSOR_SPAN_PROCESSED,
            "The number of spans for which the processing has finished, either successful or failed.",
        ),
        Signal::Log => (
            OTEL_SDK_PROCESSOR_LOG_PROCESSED,
            "The number of log records for which the processing has finished, either successful or failed.",
        ),
    };
    InstrumentDescriptor::new(name, description, record_unit(signal), InstrumentKind::Counter)
}

/// Counter: records an exporter finished with.
pub fn exporter_exported(signal: Signal) -> InstrumentDescriptor {
    let (name, description) = match signal {
        Signal::Span => (
            OTEL_SDK_EXPORTER_SPAN_EXPORTED,
            "The number of spans for which the export has finished, either successful or failed.",
        ),
        Signal::Log => (
            OTEL_SDK_EXPORTER_LOG_EXPORTED,
            "The number of log records for which the export has finished, either successful or failed.",
        ),
    };
    InstrumentDescriptor::new(name, description, record_unit(signal), InstrumentKind::Counter)
}

/// Histogram: duration of exporter calls.
pub fn exporter_operation_duration() -> InstrumentDescriptor {
    InstrumentDescriptor::new(
        OTEL_SDK_EXPORTER_OPERATION_DURATION,
        "The duration of exporting a batch of telemetry records.",
        UNIT_SECONDS,
        InstrumentKind::Histogram,
    )
}

/// Counter: spans created.
pub fn span_started() -> InstrumentDescriptor {
    InstrumentDescriptor::new(
        OTEL_SDK_SPAN_STARTED,
        "The number of created spans.",
        UNIT_SPAN,
        InstrumentKind::Counter,
    )
}

/// Up-down counter: spans started and not yet ended.
pub fn span_live() -> InstrumentDescriptor {
    InstrumentDescriptor::new(
        OTEL_SDK_SPAN_LIVE,
        "The number of created spans that have not ended yet.",
        UNIT_SPAN,
        InstrumentKind::UpDownCounter,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_names_follow_signal() {
        assert_eq!(processor_queue_size(Signal::Log).name, "otel.sdk.processor.log.queue.size");
        assert_eq!(
            processor_queue_capacity(Signal::Span).name,
            "otel.sdk.processor.span.queue.capacity"
        );
        assert_eq!(processor_processed(Signal::Span).name, "otel.sdk.processor.span.processed");
        assert_eq!(exporter_exported(Signal::Log).name, "otel.sdk.exporter.log.exported");
        assert_eq!(processor_processed(Signal::Log).unit, "{log_record}");
    }
}
