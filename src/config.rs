use crate::core::{BankslightError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Store file used when no configuration overrides it.
pub const DEFAULT_STORE_PATH: &str = "customer_data";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    pub query: Option<QueryConfig>,
    pub logging: Option<LoggingConfig>,
}

/// Where the SQLite store lives and how it is opened.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Create the file when it does not exist. Off by default: a missing
    /// store is a connection failure.
    #[serde(default)]
    pub create_if_missing: bool,
    pub busy_timeout_ms: Option<u64>,
}

/// Defaults applied to every executor and mutation call.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub timeout_ms: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: default_store_path(),
            create_if_missing: false,
            busy_timeout_ms: None,
        }
    }
}

impl StoreConfig {
    /// Store configuration pointing at the given file.
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        StoreConfig {
            path: path.into(),
            ..StoreConfig::default()
        }
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Default per-call timeout, if one is configured.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query
            .as_ref()
            .and_then(|q| q.timeout_ms)
            .map(Duration::from_millis)
    }

    /// Logging level name, `info` when unset.
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = bankslight::config::load_config("bankslight.toml").expect("Failed to load config");
/// println!("{:?}", config.store.path);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| BankslightError::Config(e.to_string()))
}

/// `<user config dir>/bankslight/config.toml`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bankslight").join("config.toml"))
}
