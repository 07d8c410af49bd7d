//! Configuration management for batching processors.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - OpenTelemetry SDK environment variable overrides
//! - Per-signal defaults
//! - Validation

use crate::core::{Result, SelfObsError, Signal};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for the span and log pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batching span processor settings
    #[serde(default = "BatchConfig::span_defaults")]
    pub span_processor: BatchConfig,
    /// Batching log processor settings
    #[serde(default = "BatchConfig::log_defaults")]
    pub log_processor: BatchConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Batching processor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records beyond this many are dropped
    pub max_queue_size: usize,
    /// Upper bound on records per export call
    pub max_export_batch_size: usize,
    /// Interval between worker wake-ups
    #[serde(with = "humantime_serde")]
    pub scheduled_delay: Duration,
    /// Time allowed for one export call
    #[serde(with = "humantime_serde")]
    pub export_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-batch events
    Trace,
    /// Successful exports and swallowed metrics errors
    Debug,
    /// Lifecycle events
    Info,
    /// Dropped records, failed or timed-out exports
    Warn,
    /// Exporter panics only
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            span_processor: BatchConfig::span_defaults(),
            log_processor: BatchConfig::log_defaults(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl BatchConfig {
    /// Defaults from the OpenTelemetry SDK environment variable spec
    pub fn for_signal(signal: Signal) -> Self {
        match signal {
            Signal::Span => Self::span_defaults(),
            Signal::Log => Self::log_defaults(),
        }
    }

    /// Span processor defaults: 2048 / 512 / 5s / 30s
    pub fn span_defaults() -> Self {
        BatchConfig {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay: Duration::from_millis(5000),
            export_timeout: Duration::from_millis(30_000),
        }
    }

    /// Log processor defaults: 2048 / 512 / 1s / 30s
    pub fn log_defaults() -> Self {
        BatchConfig {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay: Duration::from_millis(1000),
            export_timeout: Duration::from_millis(30_000),
        }
    }

    /// Signal defaults with overrides from the process environment.
    pub fn from_env(signal: Signal) -> Self {
        let mut config = Self::for_signal(signal);
        config.apply_env_with(signal, |key| std::env::var(key).ok());
        config
    }

    /// Apply `OTEL_BSP_*` / `OTEL_BLRP_*` overrides read through `lookup`.
    ///
    /// Unparsable values are ignored and the current setting is kept.
    pub fn apply_env_with<F>(&mut self, signal: Signal, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = match signal {
            Signal::Span => "OTEL_BSP",
            Signal::Log => "OTEL_BLRP",
        };

        let read = |suffix: &str| -> Option<u64> {
            let key = format!("{prefix}_{suffix}");
            let raw = lookup(&key)?;
            match raw.trim().parse::<u64>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(
                        %key,
                        value = %raw,
                        error = %e,
                        "Ignoring invalid environment override"
                    );
                    None
                },
            }
        };

        if let Some(size) = read("MAX_QUEUE_SIZE") {
            self.max_queue_size = size as usize;
        }
        if let Some(size) = read("MAX_EXPORT_BATCH_SIZE") {
            self.max_export_batch_size = size as usize;
        }
        if let Some(ms) = read("SCHEDULE_DELAY") {
            self.scheduled_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = read("EXPORT_TIMEOUT") {
            self.export_timeout = Duration::from_millis(ms);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(SelfObsError::config("max_queue_size must be greater than 0"));
        }

        if self.max_export_batch_size == 0 {
            return Err(SelfObsError::config("max_export_batch_size must be greater than 0"));
        }

        if self.max_export_batch_size > self.max_queue_size {
            return Err(SelfObsError::config(format!(
                "max_export_batch_size ({}) must not exceed max_queue_size ({})",
                self.max_export_batch_size, self.max_queue_size
            )));
        }

        if self.scheduled_delay.is_zero() {
            return Err(SelfObsError::config("scheduled_delay must be greater than 0"));
        }

        if self.export_timeout.is_zero() {
            return Err(SelfObsError::config("export_timeout must be greater than 0"));
        }

        Ok(())
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.span_processor
            .validate()
            .map_err(|e| SelfObsError::config(format!("span_processor: {e}")))?;
        self.log_processor
            .validate()
            .map_err(|e| SelfObsError::config(format!("log_processor: {e}")))?;
        Ok(())
    }

    /// Batch settings for a signal
    pub fn batch(&self, signal: Signal) -> &BatchConfig {
        match signal {
            Signal::Span => &self.span_processor,
            Signal::Log => &self.log_processor,
        }
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| SelfObsError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Apply environment variable overrides to both processors
    pub fn with_env(mut self) -> Self {
        let lookup = |key: &str| std::env::var(key).ok();
        self.config.span_processor.apply_env_with(Signal::Span, lookup);
        self.config.log_processor.apply_env_with(Signal::Log, lookup);
        self
    }

    /// Replace the span processor settings
    pub fn span_processor(mut self, batch: BatchConfig) -> Self {
        self.config.span_processor = batch;
        self
    }

    /// Replace the log processor settings
    pub fn log_processor(mut self, batch: BatchConfig) -> Self {
        self.config.log_processor = batch;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Enable structured log output
    pub fn structured_logs(mut self, structured: bool) -> Self {
        self.config.logging.structured = structured;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
