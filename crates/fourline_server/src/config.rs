//! Server configuration types and defaults.
//!
//! This module contains the configuration structures used to initialize the
//! session engine: network settings, input protection limits and the game
//! timing constants.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the game server.
///
/// Contains the network settings, the security limits applied to every
/// inbound message, and the timing constants used by the session engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Security configuration settings
    pub security: SecurityConfig,

    /// Game timing and identity settings
    pub game: GameConfig,
}

/// Security configuration for input validation and rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable rate limiting
    pub enable_rate_limiting: bool,

    /// Maximum messages accepted per window for one player
    pub max_messages_per_window: u32,

    /// Length of the rate-limit window in milliseconds
    pub rate_limit_window_ms: u64,

    /// Maximum message size in bytes
    pub max_message_size: usize,

    /// Maximum allowed nesting depth for JSON messages
    pub max_json_depth: usize,

    /// Maximum allowed string length in JSON
    pub max_string_length: usize,

    /// Maximum allowed array/object size
    pub max_collection_size: usize,
}

/// Timing constants and the synthetic opponent's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// How long a lone player waits before being paired with the bot
    pub matchmaking_fallback_ms: u64,

    /// How long a disconnected player has to come back before forfeiting
    pub reconnect_grace_ms: u64,

    /// Artificial "thinking" delay before the bot moves
    pub bot_move_delay_ms: u64,

    /// How long an unanswered friend challenge stays open
    pub challenge_ttl_ms: u64,

    /// Display name used for the bot
    pub bot_name: String,
}

impl GameConfig {
    pub fn matchmaking_fallback(&self) -> Duration {
        Duration::from_millis(self.matchmaking_fallback_ms)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_millis(self.reconnect_grace_ms)
    }

    pub fn bot_move_delay(&self) -> Duration {
        Duration::from_millis(self.bot_move_delay_ms)
    }

    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_millis(self.challenge_ttl_ms)
    }
}

impl SecurityConfig {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            security: SecurityConfig::default(),
            game: GameConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_rate_limiting: true,
            max_messages_per_window: 10,
            rate_limit_window_ms: 1000,
            max_message_size: 4 * 1024, // 4KB is plenty for the game protocol
            max_json_depth: 4,
            max_string_length: 256,
            max_collection_size: 16,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            matchmaking_fallback_ms: 10_000,
            reconnect_grace_ms: 30_000,
            bot_move_delay_ms: 500,
            challenge_ttl_ms: 60_000,
            bot_name: "Rose".to_string(),
        }
    }
}
