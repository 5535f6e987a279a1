//! Configuration storage implementation
//!
//! JSON file-based server configuration with:
//! - Atomic writes using temp file + rename
//! - Default configuration generation
//! - Validation before the server starts

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::logging::LoggingConfig;

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV_VAR: &str = "GIBOLIN_CONFIG";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where and how the configuration file is loaded
#[derive(Debug, Clone)]
pub struct ConfigStoreConfig {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Whether to create default config if not exists
    pub create_default: bool,
}

impl Default for ConfigStoreConfig {
    fn default() -> Self {
        let config_path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("gibolin")
                    .join("config.json")
            });

        Self {
            config_path,
            create_default: true,
        }
    }
}

/// One bearer credential accepted by the static identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticCredential {
    /// Bearer credential presented by the client
    #[serde(serialize_with = "serialize_secret")]
    pub credential: SecretString,
    /// Verified email of the holder
    pub email: String,
    /// Display name
    #[serde(default)]
    pub name: String,
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Identity provider selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityConfig {
    /// Fixed credential table
    Static {
        #[serde(default)]
        credentials: Vec<StaticCredential>,
    },
    /// Token-info endpoint of an external provider
    Remote {
        endpoint: String,
        #[serde(default = "default_remote_timeout")]
        timeout_secs: u64,
    },
}

fn default_remote_timeout() -> u64 {
    10
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig::Static {
            credentials: Vec::new(),
        }
    }
}

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// FLAC / MP3 catalog
    #[serde(default = "default_library_root")]
    pub library_root: PathBuf,

    /// MP3 mirror of the catalog, source of the mixes
    #[serde(default = "default_mp3_root")]
    pub mp3_root: PathBuf,

    /// Capability token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Delay between two expired-token sweeps in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Emails allowed to browse and request tokens
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// CORS origins, empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Identity provider
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_library_root() -> PathBuf {
    PathBuf::from("music")
}

fn default_mp3_root() -> PathBuf {
    PathBuf::from("mp3")
}

fn default_token_ttl() -> u64 {
    crate::token::DEFAULT_TOKEN_TTL.as_secs()
}

fn default_sweep_interval() -> u64 {
    crate::token::DEFAULT_SWEEP_INTERVAL.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            library_root: default_library_root(),
            mp3_root: default_mp3_root(),
            token_ttl_secs: default_token_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            whitelist: Vec::new(),
            cors_origins: Vec::new(),
            identity: IdentityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Parsed listening address
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("listen_addr '{}': {}", self.listen_addr, e)))
    }

    /// Check values the server cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("token_ttl_secs must be positive".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        self.socket_addr()?;
        if let IdentityConfig::Remote { endpoint, .. } = &self.identity {
            if endpoint.is_empty() {
                return Err(ConfigError::Invalid("identity endpoint is empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Loaded configuration together with its origin
pub struct ConfigStore {
    config: ServerConfig,
    settings: ConfigStoreConfig,
}

impl ConfigStore {
    /// Load the configuration file, writing the defaults first when it is
    /// missing and `create_default` is set
    pub async fn new(settings: ConfigStoreConfig) -> ConfigResult<Self> {
        let config = if tokio::fs::try_exists(&settings.config_path).await? {
            Self::load_from_file(&settings.config_path).await?
        } else if settings.create_default {
            if let Some(parent) = settings.config_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let default_config = ServerConfig::default();
            Self::save_to_file(&settings.config_path, &default_config).await?;
            tracing::info!("Wrote default configuration to {:?}", settings.config_path);
            default_config
        } else {
            return Err(ConfigError::NotFound(settings.config_path.clone()));
        };

        config.validate()?;

        Ok(Self { config, settings })
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> ConfigResult<ServerConfig> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: ServerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file with atomic write
    async fn save_to_file(path: &Path, config: &ServerConfig) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(config)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }

    /// Loaded configuration
    pub fn get(&self) -> &ServerConfig {
        &self.config
    }

    pub fn into_config(self) -> ServerConfig {
        self.config
    }

    /// File the configuration came from
    pub fn config_path(&self) -> &Path {
        &self.settings.config_path
    }
}
