//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the lobby server behavior.

use crate::error::ServerError;
use std::net::SocketAddr;
use std::time::Duration;

/// Default idle threshold before a session is evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default period between two idle sweeps.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration structure for the lobby server.
///
/// Contains the network settings, connection limits, idle-reaping timings and
/// per-connection buffer sizes.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent sessions allowed
    pub max_connections: usize,

    /// Whether to use SO_REUSEPORT for multi-threaded accept loops
    pub use_reuse_port: bool,

    /// Sessions with no inbound line for longer than this are evicted
    pub idle_timeout: Duration,

    /// How often the idle reaper sweeps the registry
    pub reap_interval: Duration,

    /// Capacity of each connection's outbound frame queue
    pub outbound_buffer: usize,

    /// Longest accepted inbound line, in bytes
    pub max_line_length: usize,
}

impl ServerConfig {
    /// Checks that the configuration can actually run a server.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be at least 1".into()));
        }
        if self.idle_timeout.is_zero() {
            return Err(ServerError::Config("idle_timeout must be greater than zero".into()));
        }
        if self.reap_interval.is_zero() {
            return Err(ServerError::Config("reap_interval must be greater than zero".into()));
        }
        if self.outbound_buffer == 0 {
            return Err(ServerError::Config("outbound_buffer must be at least 1".into()));
        }
        if self.max_line_length == 0 {
            return Err(ServerError::Config("max_line_length must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 9090)),
            max_connections: 1000,
            use_reuse_port: false,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            reap_interval: DEFAULT_REAP_INTERVAL,
            outbound_buffer: 256,
            max_line_length: 4096,
        }
    }
}
