use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of telemetry record a processor batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Finished spans
    Span,
    /// Log records
    Log,
}

impl Signal {
    /// Component type used when registering a batching processor instance
    pub fn processor_component_type(&self) -> &'static str {
        match self {
            Signal::Span => "batching_span_processor",
            Signal::Log => "batching_log_processor",
        }
    }

    /// Lowercase signal name as used inside metric identifiers
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Span => "span",
            Signal::Log => "log",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single exporter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The batch was accepted by the backend
    Success,
    /// The exporter gave up on the batch
    Failure,
    /// The exporter did not finish within the export timeout
    Timeout,
}

impl ExportOutcome {
    /// Value of the `error.type` attribute for this outcome, `None` on success
    pub fn error_type(&self) -> Option<&'static str> {
        match self {
            ExportOutcome::Success => None,
            ExportOutcome::Failure => Some("export_failed"),
            ExportOutcome::Timeout => Some("timeout"),
        }
    }

    /// Returns true if the batch was delivered
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Success)
    }
}

impl fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportOutcome::Success => f.write_str("success"),
            ExportOutcome::Failure => f.write_str("failure"),
            ExportOutcome::Timeout => f.write_str("timeout"),
        }
    }
}

/// Identity of one running component, e.g. `batching_span_processor/3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessorInstance {
    component_type: String,
    instance_id: u64,
    name: String,
}

impl ProcessorInstance {
    pub(crate) fn new(component_type: &str, instance_id: u64) -> Self {
        Self {
            component_type: component_type.to_string(),
            instance_id,
            name: format!("{component_type}/{instance_id}"),
        }
    }

    /// Component type this instance was registered under
    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    /// Numeric id issued by the registry
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Full name, used as the `otel.component.name` attribute
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ProcessorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Lifecycle of a batching processor. `Shutdown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    /// Accepting records, worker flushing on timer or threshold
    Running = 0,
    /// Shutdown in progress: final flush underway, enqueue rejected
    Draining = 1,
    /// Exporter released, every enqueue is dropped
    Shutdown = 2,
}

impl ProcessorState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Running,
            1 => ProcessorState::Draining,
            _ => ProcessorState::Shutdown,
        }
    }
}
