//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod client;
mod server;

pub use client::{CatalogClientConfig, RetryConfig, DEFAULT_CATALOG_SIZE_HINT};
pub use server::{ServerConfig, ServiceKind};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "REELRATE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "REELRATE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "REELRATE_LOG";
/// Environment variable selecting the log format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "REELRATE_LOG_FORMAT";
/// Environment variable for server port.
pub const PORT_ENV_VAR: &str = "PORT";

/// Environment variable for the AMQP URL.
pub const RABBITMQ_URL_ENV_VAR: &str = "RABBITMQ_URL";
/// Environment variable for the MongoDB connection string.
pub const MONGO_URI_ENV_VAR: &str = "MONGO_URI";
/// Environment variable for the rating queue name.
pub const QUEUE_NAME_ENV_VAR: &str = "QUEUE_NAME";
/// Environment variable for the catalog base URL.
pub const MOVIES_SERVICE_URL_ENV_VAR: &str = "MOVIES_SERVICE_URL";

/// Plain environment variables honoured for compatibility, and the config
/// key each one sets.
const LEGACY_ENV_VARS: [(&str, &str); 4] = [
    (RABBITMQ_URL_ENV_VAR, "messaging.url"),
    (MONGO_URI_ENV_VAR, "storage.uri"),
    (QUEUE_NAME_ENV_VAR, "messaging.queue"),
    (MOVIES_SERVICE_URL_ENV_VAR, "catalog.url"),
];

use serde::Deserialize;

use crate::bus::MessagingConfig;
use crate::storage::StorageConfig;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Rating queue configuration.
    pub messaging: MessagingConfig,
    /// Document store configuration.
    pub storage: StorageConfig,
    /// Catalog API used by the random-movie picker.
    pub catalog: CatalogClientConfig,
    /// Connection backoff.
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. Legacy plain variables (`RABBITMQ_URL`, `MONGO_URI`, `QUEUE_NAME`,
    ///    `MOVIES_SERVICE_URL`)
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in LEGACY_ENV_VARS {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(key, value)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Port `kind` listens on; `PORT` wins over the configured value.
    pub fn port_for(&self, kind: ServiceKind) -> u16 {
        std::env::var(PORT_ENV_VAR)
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| self.server.port_for(kind))
    }

    /// `host:port` bind address of `kind`.
    pub fn bind_address(&self, kind: ServiceKind) -> String {
        format!("{}:{}", self.server.host, self.port_for(kind))
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
