//! Configuration management for the lobby server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use crate::cli::CliArgs;
use anyhow::{Context, Result};
use lobby_core::ServerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Game server settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Read-only HTTP monitoring settings
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Game server settings.
///
/// Controls network binding, connection limits, idle reaping and buffer sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the game server to (e.g. "0.0.0.0:9090")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Maximum number of concurrent sessions
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Whether to use SO_REUSEPORT for multi-threaded accept loops
    #[serde(default)]
    pub use_reuse_port: bool,
    /// Seconds without input before a session is evicted
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Seconds between two idle sweeps
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// Outbound frames queued per connection before new ones are dropped
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Longest accepted inbound line, in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_max_connections() -> usize {
    1000
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_max_line_length() -> usize {
    4096
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_connections: default_max_connections(),
            use_reuse_port: false,
            idle_timeout_secs: default_idle_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            outbound_buffer: default_outbound_buffer(),
            max_line_length: default_max_line_length(),
        }
    }
}

/// Monitoring HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Whether to serve the monitoring endpoints at all
    #[serde(default = "default_monitor_enabled")]
    pub enabled: bool,
    /// Address the monitoring endpoints listen on
    #[serde(default = "default_monitor_bind_address")]
    pub bind_address: String,
}

fn default_monitor_enabled() -> bool {
    true
}

fn default_monitor_bind_address() -> String {
    "0.0.0.0:9091".to_string()
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            enabled: default_monitor_enabled(),
            bind_address: default_monitor_bind_address(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes a default configuration file at the
    /// specified path and returns the defaults.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to write default config {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file values.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(bind) = &args.bind {
            self.server.bind_address = bind.clone();
        }
        if let Some(monitor_bind) = &args.monitor_bind {
            self.monitor.bind_address = monitor_bind.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(max_connections) = args.max_connections {
            self.server.max_connections = max_connections;
        }
        if let Some(idle_timeout) = args.idle_timeout {
            self.server.idle_timeout_secs = idle_timeout;
        }
    }

    /// Converts to the core server configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig> {
        Ok(ServerConfig {
            bind_address: self
                .server
                .bind_address
                .parse()
                .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?,
            max_connections: self.server.max_connections,
            use_reuse_port: self.server.use_reuse_port,
            idle_timeout: Duration::from_secs(self.server.idle_timeout_secs),
            reap_interval: Duration::from_secs(self.server.reap_interval_secs),
            outbound_buffer: self.server.outbound_buffer,
            max_line_length: self.server.max_line_length,
        })
    }

    /// The parsed monitoring address.
    pub fn monitor_address(&self) -> Result<SocketAddr> {
        self.monitor
            .bind_address
            .parse()
            .with_context(|| format!("Invalid monitor address: {}", self.monitor.bind_address))
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Returns an error string describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }
        if self.monitor.enabled && self.monitor.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "Invalid monitor address: {}",
                &self.monitor.bind_address
            ));
        }

        if self.server.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        if self.server.idle_timeout_secs == 0 {
            return Err("idle_timeout_secs must be greater than zero".to_string());
        }
        if self.server.reap_interval_secs == 0 {
            return Err("reap_interval_secs must be greater than zero".to_string());
        }
        if self.server.outbound_buffer == 0 {
            return Err("outbound_buffer must be at least 1".to_string());
        }
        if self.server.max_line_length == 0 {
            return Err("max_line_length must be at least 1".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_address, "0.0.0.0:9090");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.idle_timeout_secs, 300);
        assert_eq!(config.server.reap_interval_secs, 60);
        assert!(config.monitor.enabled);
        assert_eq!(config.monitor.bind_address, "0.0.0.0:9091");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_server_config() {
        let config = AppConfig::default();
        let server_config = config.to_server_config().unwrap();

        assert_eq!(server_config.bind_address.port(), 9090);
        assert_eq!(server_config.idle_timeout, Duration::from_secs(300));
        assert_eq!(server_config.reap_interval, Duration::from_secs(60));
        assert_eq!(server_config.outbound_buffer, 256);
        assert!(server_config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_values() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid bind address"));

        let mut config = AppConfig::default();
        config.server.idle_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));

        let mut config = AppConfig::default();
        config.monitor.bind_address = "nowhere".to_string();
        assert!(config.validate().is_err());
        config.monitor.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            bind: Some("127.0.0.1:7000".to_string()),
            log_level: Some("debug".to_string()),
            json_logs: true,
            max_connections: Some(5),
            idle_timeout: Some(30),
            ..Default::default()
        };

        config.apply_cli(&args);
        assert_eq!(config.server.bind_address, "127.0.0.1:7000");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.server.max_connections, 5);
        assert_eq!(config.server.idle_timeout_secs, 30);
        assert_eq!(config.monitor.bind_address, "0.0.0.0:9091");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let toml_content = r#"
[server]
bind_address = "127.0.0.1:8000"

[logging]
level = "warn"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8000");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.max_line_length, 4096);
        assert!(config.monitor.enabled);
        assert_eq!(config.logging.level, "warn");
        assert!(!config.logging.json_format);
    }

    #[tokio::test]
    async fn test_load_existing_file() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), "[server]\nmax_connections = 12\n")
            .await
            .unwrap();

        let config = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.server.max_connections, 12);
    }

    #[tokio::test]
    async fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:9090");
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.monitor.bind_address, config.monitor.bind_address);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), "[server\n").await.unwrap();
        assert!(AppConfig::load_from_file(file.path()).await.is_err());
    }
}
