//! Utility functions and helper methods for the game server.
//!
//! This module provides convenient factory functions for creating server
//! instances, plus small shared helpers.

use crate::{collaborators::Collaborators, config::ServerConfig, server::GameServer};
use std::time::{SystemTime, UNIX_EPOCH};

/// Creates a new game server with default configuration.
///
/// Finished games are only logged and lifecycle events go to the tracing
/// publisher.
///
/// # Example
///
/// ```rust
/// use fourline_server::create_server;
///
/// let server = create_server();
/// assert_eq!(server.config().game.bot_name, "Rose");
/// ```
pub fn create_server() -> GameServer {
    GameServer::new(ServerConfig::default())
}

/// Creates a new game server with custom configuration and collaborators.
///
/// # Arguments
///
/// * `config` - A `ServerConfig` instance with desired settings
/// * `collaborators` - Where finished games and lifecycle events are sent
///
/// # Example
///
/// ```rust
/// use fourline_server::{create_server_with_config, Collaborators, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config, Collaborators::default());
/// ```
pub fn create_server_with_config(config: ServerConfig, collaborators: Collaborators) -> GameServer {
    GameServer::with_collaborators(config, collaborators)
}

/// Milliseconds since the Unix epoch, saturating on clock errors.
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
