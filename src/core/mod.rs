//! Core types, configuration and errors shared by the processor and metrics layers.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use config::{BatchConfig, Config, ConfigBuilder, LogLevel, LoggingConfig};
pub use error::{MetricsError, Result, SelfObsError};
pub use registry::InstanceRegistry;
pub use types::{ExportOutcome, ProcessorInstance, ProcessorState, Signal};
