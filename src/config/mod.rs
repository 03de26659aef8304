//! Configuration management for knapsack
//!
//! Configuration is read from a TOML file and overridden by command-line
//! arguments. Precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::utils::time::parse_duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cluster connection configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Export defaults
    #[serde(default)]
    pub export: ExportConfig,

    /// Running-job registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Base URL of the cluster REST endpoint
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Node identity recorded in job state (hostname when unset)
    #[serde(default)]
    pub node_name: Option<String>,
}

/// Export defaults applied when a request leaves them unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Archive path used when the request names none
    #[serde(default = "default_path")]
    pub default_path: PathBuf,

    /// Scroll keep-alive (e.g. "1m")
    #[serde(default = "default_scroll_timeout")]
    pub scroll_timeout: String,

    /// Hits requested per scroll page
    #[serde(default = "default_scroll_size")]
    pub scroll_size: u32,

    /// Advisory transfer budget in bytes (0 = unknown)
    #[serde(default)]
    pub bytes_to_transfer: u64,

    /// Draw a byte progress bar while exporting
    #[serde(default)]
    pub progress_bar: bool,
}

/// Running-job registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Persist running jobs to this JSON file
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_path() -> PathBuf {
    PathBuf::from("_all.jsonl")
}

fn default_scroll_timeout() -> String {
    "1m".to_string()
}

fn default_scroll_size() -> u32 {
    1000
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            request_timeout: default_request_timeout(),
            node_name: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_path: default_path(),
            scroll_timeout: default_scroll_timeout(),
            scroll_size: default_scroll_size(),
            bytes_to_transfer: 0,
            progress_bar: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from an explicit file, or the default location
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".knapsack")
            .join("config.toml")
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.cluster.url.trim().is_empty() {
            return Err(invalid("cluster.url", &self.cluster.url));
        }
        if self.export.scroll_size == 0 {
            return Err(invalid("export.scroll_size", "0"));
        }
        if parse_duration(&self.export.scroll_timeout).is_none() {
            return Err(invalid("export.scroll_timeout", &self.export.scroll_timeout));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster.request_timeout)
    }

    /// Get scroll keep-alive as Duration
    ///
    /// Falls back to one minute when the configured value does not parse.
    pub fn scroll_timeout(&self) -> Duration {
        parse_duration(&self.export.scroll_timeout).unwrap_or(Duration::from_secs(60))
    }

    /// Node identity recorded in job state
    pub fn node_name(&self) -> String {
        self.cluster.node_name.clone().unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string())
        })
    }
}

fn invalid(field: &str, value: &str) -> crate::error::KnapsackError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
