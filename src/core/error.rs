//! Error types for processor construction and the metrics backend contract.

use thiserror::Error;

/// Errors surfaced to callers. Only construction and logging setup can fail.
#[derive(Error, Debug)]
pub enum SelfObsError {
    /// Invalid batch or logging configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No tokio runtime available when starting a processor
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Subscriber installation failed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Metrics backend failure
    #[error("Self-metrics error: {0}")]
    Metrics(#[from] MetricsError),
}

/// Failures raised by a metrics backend.
///
/// These never leave the self-metrics binding; they exist so backends can
/// report what went wrong and so the binding can log it at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// No backend installed
    #[error("no metrics backend available")]
    Unavailable,

    /// The backend refused to create an instrument
    #[error("failed to register instrument {instrument}: {reason}")]
    Registration {
        /// Metric name
        instrument: &'static str,
        /// Backend-provided reason
        reason: String,
    },

    /// A measurement could not be recorded
    #[error("failed to record measurement: {0}")]
    Recording(String),

    /// The backend panicked inside the named operation
    #[error("metrics backend panicked during {0}")]
    BackendPanicked(&'static str),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SelfObsError>;

impl SelfObsError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new runtime error
    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates a new logging error
    pub fn logging<S: Into<String>>(msg: S) -> Self {
        Self::Logging(msg.into())
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Runtime(_) => "runtime",
            Self::Logging(_) => "logging",
            Self::Metrics(_) => "metrics",
        }
    }
}

impl MetricsError {
    /// Creates a registration error for the named instrument
    pub fn registration<S: Into<String>>(instrument: &'static str, reason: S) -> Self {
        Self::Registration {
            instrument,
            reason: reason.into(),
        }
    }
}
