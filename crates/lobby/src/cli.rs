//! Command-line argument parsing
//!
//! Every flag except `--config` overrides the matching value from the
//! configuration file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the lobby server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Line-oriented multiplayer lobby server", long_about = None)]
pub struct CliArgs {
    /// Configuration file path
    ///
    /// If the file doesn't exist, a default configuration will be created.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Game listen address (e.g. "0.0.0.0:9090")
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Monitoring HTTP listen address (e.g. "127.0.0.1:9091")
    #[arg(long)]
    pub monitor_bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Maximum number of concurrent sessions
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Idle timeout in seconds before a silent session is evicted
    #[arg(long)]
    pub idle_timeout: Option<u64>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
            bind: None,
            monitor_bind: None,
            log_level: None,
            json_logs: false,
            max_connections: None,
            idle_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = CliArgs::default();
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert!(!args.json_logs);
        assert!(args.bind.is_none());
        assert!(args.max_connections.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let args = CliArgs::parse_from([
            "lobby",
            "-c",
            "custom.toml",
            "--bind",
            "127.0.0.1:7000",
            "--monitor-bind",
            "127.0.0.1:7001",
            "-l",
            "debug",
            "--json-logs",
            "--max-connections",
            "50",
            "--idle-timeout",
            "90",
        ]);

        assert_eq!(args.config, PathBuf::from("custom.toml"));
        assert_eq!(args.bind.as_deref(), Some("127.0.0.1:7000"));
        assert_eq!(args.monitor_bind.as_deref(), Some("127.0.0.1:7001"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.max_connections, Some(50));
        assert_eq!(args.idle_timeout, Some(90));
    }
}
