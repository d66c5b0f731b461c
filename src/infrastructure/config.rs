//! Configuration management for cache nodes
//!
//! Loads configuration from cache-node.toml at startup.
//! All values are configurable to avoid hardcoded constants.

use crate::core::DEFAULT_MONITOR_DOMAIN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Per-node queue and buffer settings
    #[serde(default)]
    pub node: NodeConfig,

    /// Monitoring registration settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-node queue and buffer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Capacity of the outbound (write) queue
    #[serde(default = "default_queue_capacity")]
    pub write_queue_capacity: usize,

    /// Capacity of the in-flight (read) queue
    #[serde(default = "default_queue_capacity")]
    pub read_queue_capacity: usize,

    /// Capacity of the staging (input) queue
    #[serde(default = "default_queue_capacity")]
    pub input_queue_capacity: usize,

    /// Maximum time an enqueue may block on a full queue (0 = fail fast)
    #[serde(default = "default_op_queue_max_block_time_ms")]
    pub op_queue_max_block_time_ms: u64,

    /// Read buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub read_buffer_size: usize,

    /// Write buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub write_buffer_size: usize,

    /// Number of I/O buffers kept in the shared pool
    #[serde(default = "default_buffer_pool_capacity")]
    pub buffer_pool_capacity: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Register nodes with the monitoring registry
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Domain prefix of monitoring names
    #[serde(default = "default_domain")]
    pub domain: String,

    /// How long a registry call may wait for its lock
    #[serde(default = "default_registry_lock_timeout_ms")]
    pub registry_lock_timeout_ms: u64,

    /// Interval between monitoring polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Default filter directive (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            write_queue_capacity: default_queue_capacity(),
            read_queue_capacity: default_queue_capacity(),
            input_queue_capacity: default_queue_capacity(),
            op_queue_max_block_time_ms: default_op_queue_max_block_time_ms(),
            read_buffer_size: default_buffer_size(),
            write_buffer_size: default_buffer_size(),
            buffer_pool_capacity: default_buffer_pool_capacity(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            domain: default_domain(),
            registry_lock_timeout_ms: default_registry_lock_timeout_ms(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

fn default_queue_capacity() -> usize {
    16_384
}

fn default_op_queue_max_block_time_ms() -> u64 {
    10
}

fn default_buffer_size() -> usize {
    16 * 1024
}

fn default_buffer_pool_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_domain() -> String {
    DEFAULT_MONITOR_DOMAIN.to_string()
}

fn default_registry_lock_timeout_ms() -> u64 {
    50
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    /// Enqueue block limit; `None` means fail fast on a full queue
    #[inline]
    pub fn op_queue_max_block_time(&self) -> Option<Duration> {
        match self.op_queue_max_block_time_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl MonitoringConfig {
    #[inline]
    pub fn registry_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_lock_timeout_ms)
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Config {
    /// Load configuration from cache-node.toml
    ///
    /// The path can be overridden with `CONFIG_PATH`. If the file doesn't
    /// exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "cache-node.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let node = &self.node;
        for (field, value) in [
            ("node.write_queue_capacity", node.write_queue_capacity),
            ("node.read_queue_capacity", node.read_queue_capacity),
            ("node.input_queue_capacity", node.input_queue_capacity),
            ("node.buffer_pool_capacity", node.buffer_pool_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be > 0", field)));
            }
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Parse error (invalid TOML)
    #[error("Failed to parse config: {0}")]
    Parse(String),
    /// Value out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.node.write_queue_capacity, 16_384);
        assert_eq!(config.node.op_queue_max_block_time_ms, 10);
        assert!(config.monitoring.enabled);
        assert_eq!(config.monitoring.domain, "com.netflix.evcache");
        assert_eq!(config.logging.dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [node]
            input_queue_capacity = 8
            op_queue_max_block_time_ms = 0

            [monitoring]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.node.input_queue_capacity, 8);
        assert_eq!(config.node.read_queue_capacity, 16_384);
        assert_eq!(config.node.op_queue_max_block_time(), None);
        assert!(!config.monitoring.enabled);
        assert_eq!(config.monitoring.registry_lock_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Config::from_toml("[node]\nwrite_queue_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[node\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_block_time_conversion() {
        let node = NodeConfig::default();
        assert_eq!(node.op_queue_max_block_time(), Some(Duration::from_millis(10)));
    }
}
