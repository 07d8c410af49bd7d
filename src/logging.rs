//! Diagnostic logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the host application. [`init_logging`] is a convenience for binaries and
//! tests that want the same output format everywhere.

use crate::core::{LoggingConfig, Result, SelfObsError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable consulted when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "OTEL_SELFOBS_LOG";

/// Build the filter: `RUST_LOG`, then [`LOG_LEVEL_ENV`], then the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var(LOG_LEVEL_ENV)
            .unwrap_or_else(|_| config.level.as_str().to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
    })
}

/// Install a global fmt subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);

    let fmt_layer = if config.structured {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .compact()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).compact()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| SelfObsError::logging(format!("Failed to initialize logging: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            structured: true,
        };
        // Another test may have installed a subscriber first; either way the
        // second call must fail.
        let _ = init_logging(&config);
        let err = init_logging(&config).unwrap_err();
        assert_eq!(err.category(), "logging");
    }
}
