//! Server configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file (`STORECAST_CONFIG` or a default path)
//! - Environment variables (`STORECAST_*`, nested keys separated by `__`)

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storecast_core::RegistryConfig;

/// Environment variable prefix.
const ENV_PREFIX: &str = "STORECAST";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP routing configuration.
    #[serde(default)]
    pub http: HttpConfig,

    /// Event stream configuration.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Snapshot producer configuration.
    #[serde(default)]
    pub producer: ProducerConfig,

    /// Store catalog configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Shutdown configuration.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// HTTP routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Prefix every route is mounted under.
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

/// Event stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Pending messages held per connection before the oldest is dropped.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Keep-alive comment interval in milliseconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_ms: u64,
}

/// Snapshot producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Delay between two snapshots of a store, in milliseconds.
    #[serde(default = "default_producer_interval")]
    pub interval_ms: u64,
}

/// Store catalog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Number of stores, with IDs `1..=stores`.
    #[serde(default = "default_stores")]
    pub stores: u64,

    /// Number of tables per store, numbered `1..=tables_per_store`.
    #[serde(default = "default_tables_per_store")]
    pub tables_per_store: u32,

    /// Broadcast a fresh snapshot right after a status update.
    #[serde(default)]
    pub broadcast_on_update: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for producer tasks to exit, in milliseconds.
    #[serde(default = "default_grace")]
    pub grace_ms: u64,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_base_path() -> String {
    "/api".to_string()
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_keepalive() -> u64 {
    15_000 // 15 seconds
}

fn default_producer_interval() -> u64 {
    10_000 // 10 seconds
}

fn default_stores() -> u64 {
    600
}

fn default_tables_per_store() -> u32 {
    50
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_grace() -> u64 {
    5_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            http: HttpConfig::default(),
            stream: StreamConfig::default(),
            producer: ProducerConfig::default(),
            catalog: CatalogConfig::default(),
            metrics: MetricsConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            keepalive_ms: default_keepalive(),
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_producer_interval(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            stores: default_stores(),
            tables_per_store: default_tables_per_store(),
            broadcast_on_update: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// The file is `STORECAST_CONFIG` if set, otherwise the first existing
    /// default path. Environment variables override file values.
    ///
    /// # Errors
    ///
    /// Returns an error if a config source exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = Self::find_file() {
            tracing::info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn find_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(format!("{ENV_PREFIX}_CONFIG")) {
            return Some(PathBuf::from(shellexpand::tilde(&path).as_ref()));
        }

        let config_paths = [
            "storecast.toml",
            "/etc/storecast/storecast.toml",
            "~/.config/storecast/storecast.toml",
        ];

        config_paths
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.producer.interval_ms > 0, "producer.interval_ms must be positive");
        ensure!(self.stream.keepalive_ms > 0, "stream.keepalive_ms must be positive");
        ensure!(
            self.stream.mailbox_capacity > 0,
            "stream.mailbox_capacity must be positive"
        );
        ensure!(
            self.http.base_path.is_empty() || self.http.base_path.starts_with('/'),
            "http.base_path must start with '/'"
        );
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Registry settings derived from this configuration.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            producer_interval: Duration::from_millis(self.producer.interval_ms),
            mailbox_capacity: self.stream.mailbox_capacity,
        }
    }

    /// Keep-alive interval of event streams.
    #[must_use]
    pub fn keepalive(&self) -> Duration {
        Duration::from_millis(self.stream.keepalive_ms)
    }

    /// Upper bound on waiting for producers at shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown.grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.http.base_path, "/api");
        assert_eq!(config.catalog.stores, 600);
        assert_eq!(config.catalog.tables_per_store, 50);
        assert_eq!(
            config.registry_config().producer_interval,
            Duration::from_secs(10)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr().unwrap().port(), 8000);

        let bad = Config {
            host: "not a host".into(),
            ..Config::default()
        };
        assert!(bad.bind_addr().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [producer]
            interval_ms = 30000

            [catalog]
            stores = 3
            broadcast_on_update = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.producer.interval_ms, 30_000);
        assert_eq!(config.catalog.stores, 3);
        assert_eq!(config.catalog.tables_per_store, 50);
        assert!(config.catalog.broadcast_on_update);
        assert_eq!(config.stream.mailbox_capacity, 256);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.producer.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.http.base_path = "api".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("storecast-test-{}.toml", std::process::id()));
        std::fs::write(&path, "port = 8123\n[stream]\nkeepalive_ms = 500\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.port, 8123);
        assert_eq!(config.keepalive(), Duration::from_millis(500));
    }
}
