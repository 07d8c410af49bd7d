//! Configuration system tests.

use otel_selfobs::core::{BatchConfig, Config, ConfigBuilder, LogLevel};
use otel_selfobs::Signal;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.span_processor.max_queue_size, 2048);
    assert_eq!(config.span_processor.max_export_batch_size, 512);
    assert_eq!(config.span_processor.scheduled_delay, Duration::from_secs(5));
    assert_eq!(config.log_processor.scheduled_delay, Duration::from_secs(1));
    assert_eq!(config.log_processor.export_timeout, Duration::from_secs(30));
    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn test_config_builder() {
    let config = ConfigBuilder::new()
        .span_processor(BatchConfig {
            max_queue_size: 100,
            max_export_batch_size: 10,
            scheduled_delay: Duration::from_millis(250),
            export_timeout: Duration::from_secs(2),
        })
        .log_level(LogLevel::Debug)
        .structured_logs(true)
        .build()
        .unwrap();

    assert_eq!(config.batch(Signal::Span).max_queue_size, 100);
    assert_eq!(config.batch(Signal::Log), &BatchConfig::log_defaults());
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert!(config.logging.structured);
}

#[test]
fn test_yaml_config() {
    let yaml = r#"
span_processor:
  max_queue_size: 1000
  max_export_batch_size: 100
  scheduled_delay: 500ms
  export_timeout: 10s
log_processor:
  max_queue_size: 50
  max_export_batch_size: 50
  scheduled_delay: 2s
  export_timeout: 1m
logging:
  level: warn
  structured: true
"#;

    let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

    assert_eq!(config.span_processor.scheduled_delay, Duration::from_millis(500));
    assert_eq!(config.span_processor.export_timeout, Duration::from_secs(10));
    assert_eq!(config.log_processor.max_queue_size, 50);
    assert_eq!(config.log_processor.export_timeout, Duration::from_secs(60));
    assert_eq!(config.logging.level, LogLevel::Warn);
}

#[test]
fn test_config_validation() {
    let invalid = ConfigBuilder::new()
        .log_processor(BatchConfig {
            max_queue_size: 8,
            max_export_batch_size: 16,
            ..BatchConfig::log_defaults()
        })
        .build();
    let err = invalid.unwrap_err();
    assert_eq!(err.category(), "config");
    assert!(err.to_string().contains("log_processor"));

    let zero_delay = BatchConfig {
        scheduled_delay: Duration::ZERO,
        ..BatchConfig::span_defaults()
    };
    assert!(zero_delay.validate().is_err());

    let zero_timeout = BatchConfig {
        export_timeout: Duration::ZERO,
        ..BatchConfig::span_defaults()
    };
    assert!(zero_timeout.validate().is_err());

    let zero_batch = BatchConfig {
        max_export_batch_size: 0,
        ..BatchConfig::span_defaults()
    };
    assert!(zero_batch.validate().is_err());
}

#[test]
fn test_span_env_overrides() {
    let mut batch = BatchConfig::span_defaults();
    batch.apply_env_with(Signal::Span, |key| match key {
        "OTEL_BSP_MAX_EXPORT_BATCH_SIZE" => Some("64".to_string()),
        "OTEL_BSP_EXPORT_TIMEOUT" => Some(" 1500 ".to_string()),
        "OTEL_BLRP_MAX_EXPORT_BATCH_SIZE" => Some("1".to_string()),
        _ => None,
    });

    assert_eq!(batch.max_export_batch_size, 64);
    assert_eq!(batch.export_timeout, Duration::from_millis(1500));
    assert_eq!(batch.max_queue_size, 2048);
}

#[test]
fn test_error_handling() {
    let result = ConfigBuilder::new().from_yaml("invalid: yaml: content: [");
    assert!(result.is_err());

    let result = ConfigBuilder::new().from_yaml(
        r#"
span_processor:
  max_queue_size: 10
  max_export_batch_size: 5
  scheduled_delay: "soon"
  export_timeout: 1s
"#,
    );
    assert!(result.is_err());
}
