//! Logging System
//!
//! Structured `tracing` logs with:
//! - Configurable verbosity, globally and per module
//! - Text or JSON output
//! - Console and/or rolling file output through a non-blocking writer

mod config;

#[cfg(test)]
mod tests;

pub use config::{default_log_directory, LogFormat, LogLevel, LogOutput, LoggingConfig, RotationStrategy};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// File name prefix of rolled log files
const LOG_FILE_PREFIX: &str = "gibolin-stream.log";

/// Logging system errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for logging operations
pub type LoggingResult<T> = Result<T, LoggingError>;

/// Installed global subscriber.
///
/// Keep it alive for the life of the process; dropping it flushes and
/// closes the file writer.
pub struct LoggingSystem {
    directory: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global subscriber described by `config`
    pub fn init(config: LoggingConfig) -> LoggingResult<Self> {
        let console = config
            .output
            .writes_console()
            .then(|| Self::console_layer(&config));

        let (file, guard, directory) = if config.output.writes_file() {
            let directory = config.directory();
            let (layer, guard) = Self::file_layer(&config, &directory)?;
            (Some(layer), Some(guard), Some(directory))
        } else {
            (None, None, None)
        };

        tracing_subscriber::registry()
            .with(Self::env_filter(&config))
            .with(console)
            .with(file)
            .try_init()
            .map_err(|e| LoggingError::InitializationError(e.to_string()))?;

        Ok(Self {
            directory,
            _guard: guard,
        })
    }

    /// `RUST_LOG` when set, the configured directives otherwise
    fn env_filter(config: &LoggingConfig) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        EnvFilter::try_new(config.filter_directives())
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()))
    }

    fn console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_source_location)
            .with_line_number(config.show_source_location);

        match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        }
    }

    fn file_layer<S>(
        config: &LoggingConfig,
        directory: &Path,
    ) -> LoggingResult<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard)>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        std::fs::create_dir_all(directory).map_err(|e| {
            LoggingError::DirectoryCreationError(format!("{:?}: {}", directory, e))
        })?;

        let appender = RollingFileAppender::new(config.rotation.into(), directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_source_location)
            .with_line_number(config.show_source_location);

        let layer = match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        };
        Ok((layer, guard))
    }

    /// Directory of the rolled log files, when file output is on
    pub fn log_directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }
}
