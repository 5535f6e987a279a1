//! gibolin-stream - personal audio library streaming server
//!
//! This crate provides the core functionality for gibolin-stream including:
//! - Short-lived capability tokens with a cancellable background sweep
//! - Random-access sources composing many files into one seekable stream
//! - An HTTP server with bearer authentication and byte-range support
//! - JSON configuration and structured logging

pub mod config;
pub mod logging;
pub mod server;
pub mod source;
pub mod token;

// Re-export commonly used items
pub use config::{ConfigError, ConfigStore, ServerConfig};
pub use logging::{LoggingConfig, LoggingSystem};
pub use server::{ServerError, StreamServer};
pub use source::{CompositeSource, FilePart, MemoryPart, RandomAccessSource, ReadError, SourceError};
pub use token::{CapabilityStore, SweepHandle, TokenError};
