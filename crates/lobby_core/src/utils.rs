//! Convenience constructors for [`GameServer`].

use crate::config::ServerConfig;
use crate::server::GameServer;

/// Creates a server with the default configuration (`0.0.0.0:9090`).
pub fn create_server() -> GameServer {
    GameServer::new(ServerConfig::default())
}

/// Creates a server with a custom configuration.
pub fn create_server_with_config(config: ServerConfig) -> GameServer {
    GameServer::new(config)
}
