//! Configuration Management Module
//!
//! Server settings live in one JSON file:
//! - Path from `GIBOLIN_CONFIG`, else the platform config directory
//! - A default file is written on first start
//! - Every field falls back to its default when absent

mod storage;

pub use storage::{
    ConfigError, ConfigResult, ConfigStore, ConfigStoreConfig, IdentityConfig,
    ServerConfig, StaticCredential, CONFIG_ENV_VAR,
};
