//! Tests for the logging system

use super::*;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;

#[test]
fn test_log_level_directives() {
    let levels = [
        (LogLevel::Trace, "trace", LevelFilter::TRACE),
        (LogLevel::Debug, "debug", LevelFilter::DEBUG),
        (LogLevel::Info, "info", LevelFilter::INFO),
        (LogLevel::Warn, "warn", LevelFilter::WARN),
        (LogLevel::Error, "error", LevelFilter::ERROR),
    ];
    for (level, text, filter) in levels {
        assert_eq!(level.to_string(), text);
        assert_eq!(LevelFilter::from(level), filter);
    }
    assert!(LogLevel::Trace < LogLevel::Error);
}

#[test]
fn test_output_destinations() {
    assert!(LogOutput::Console.writes_console());
    assert!(!LogOutput::Console.writes_file());
    assert!(!LogOutput::File.writes_console());
    assert!(LogOutput::File.writes_file());
    assert!(LogOutput::Both.writes_console() && LogOutput::Both.writes_file());
}

#[test]
fn test_rotation_mapping() {
    assert_eq!(Rotation::from(RotationStrategy::Daily), Rotation::DAILY);
    assert_eq!(Rotation::from(RotationStrategy::Hourly), Rotation::HOURLY);
    assert_eq!(Rotation::from(RotationStrategy::Never), Rotation::NEVER);
}

#[test]
fn test_presets() {
    let dev = LoggingConfig::development();
    assert_eq!(dev.level, LogLevel::Debug);
    assert_eq!(dev.output, LogOutput::Console);
    assert!(dev.show_source_location);

    let prod = LoggingConfig::production();
    assert_eq!(prod.format, LogFormat::Json);
    assert!(prod.output.writes_file());
    assert_eq!(prod.filter_directives(), "info,hyper=warn,tower_http=warn");
}

#[test]
fn test_directory_falls_back_to_platform_default() {
    let config = LoggingConfig::default();
    assert_eq!(config.directory(), default_log_directory());

    let config = LoggingConfig {
        directory: Some(PathBuf::from("/var/log/gibolin")),
        ..LoggingConfig::default()
    };
    assert_eq!(config.directory(), PathBuf::from("/var/log/gibolin"));
}

#[test]
fn test_filter_directives_sorted_by_target() {
    let mut config = LoggingConfig {
        level: LogLevel::Warn,
        ..LoggingConfig::default()
    };
    config.modules.insert("tower_http".to_string(), LogLevel::Debug);
    config.modules.insert("gibolin_stream".to_string(), LogLevel::Trace);

    assert_eq!(
        config.filter_directives(),
        "warn,gibolin_stream=trace,tower_http=debug"
    );
    assert!(EnvFilter::try_new(config.filter_directives()).is_ok());
}

#[test]
fn test_partial_section_uses_defaults() {
    let config: LoggingConfig =
        serde_json::from_str(r#"{"level": "debug", "modules": {"hyper": "error"}}"#).unwrap();
    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.output, LogOutput::Console);
    assert_eq!(config.rotation, RotationStrategy::Daily);
    assert!(config.show_target);
    assert_eq!(config.filter_directives(), "debug,hyper=error");
}
