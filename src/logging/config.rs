//! Logging settings as stored in the server configuration file

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;

/// Verbosity, spelled as in `RUST_LOG` directives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive text understood by `EnvFilter`
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Where events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    pub fn writes_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    pub fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

/// Roll-over period of the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl From<RotationStrategy> for Rotation {
    fn from(strategy: RotationStrategy) -> Self {
        match strategy {
            RotationStrategy::Daily => Rotation::DAILY,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Never => Rotation::NEVER,
        }
    }
}

/// `logging` section of the configuration file.
///
/// Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file directory, platform data directory when unset
    pub directory: Option<PathBuf>,
    pub rotation: RotationStrategy,
    /// Per-target overrides, e.g. `"tower_http": "warn"`
    pub modules: BTreeMap<String, LogLevel>,
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            output: LogOutput::Console,
            directory: None,
            rotation: RotationStrategy::Daily,
            modules: BTreeMap::new(),
            show_target: true,
            show_thread_ids: false,
            show_source_location: false,
        }
    }
}

impl LoggingConfig {
    /// Verbose console output for local runs
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            show_thread_ids: true,
            show_source_location: true,
            ..Self::default()
        }
    }

    /// JSON to console and file, HTTP stack internals quietened
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            output: LogOutput::Both,
            modules: BTreeMap::from([
                ("hyper".to_string(), LogLevel::Warn),
                ("tower_http".to_string(), LogLevel::Warn),
            ]),
            ..Self::default()
        }
    }

    /// Directory the file writer rolls into
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_log_directory)
    }

    /// `EnvFilter` directives: the global level, then one per module
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.level.as_directive().to_string())
            .chain(
                self.modules
                    .iter()
                    .map(|(target, level)| format!("{}={}", target, level)),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// `<data_local_dir>/gibolin/logs`, or `./logs` without one
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("gibolin").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
