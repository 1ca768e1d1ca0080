//! # Fourline Server - Real-Time Four-in-a-Row Sessions
//!
//! A WebSocket game server that pairs players into six-by-seven
//! four-in-a-row matches, falls back to a heuristic bot when nobody else is
//! waiting, and survives short disconnects without losing the game.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Game Server** - Accept loop and per-socket connection tasks
//! * **Session Engine** - A single task that owns every piece of game state
//! * **Security** - Per-player rate limiting and JSON shape validation
//! * **Collaborators** - Where finished games and lifecycle events are sent
//!
//! ### Message Flow
//!
//! 1. Client sends a JSON text frame such as `{"type": "JOIN", "username": "alice"}`
//! 2. The connection task forwards the raw text to the engine
//! 3. The engine rate limits, validates and routes it to a handler
//! 4. Replies are queued on the connection's outbox and written back in order
//!
//! Timers (matchmaking fallback, reconnect grace, bot think time, challenge
//! expiry) are ordinary events on the same channel, so every state change
//! happens in one place and in arrival order.
//!
//! ## Configuration
//!
//! The server is configured through [`ServerConfig`]:
//!
//! * **Network settings** - Bind address and connection limit
//! * **Security** - Rate limits and message shape limits
//! * **Game timing** - Fallback, grace, bot delay and challenge lifetime
//!
//! ## Error Handling
//!
//! * [`ServerError`] - startup and infrastructure failures
//! * [`ProtocolError`] - bad client input, answered with an `ERROR` frame
//! * [`CollaboratorError`] - archive or event sink failures, logged and dropped
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use fourline_server::{create_server_with_config, Collaborators, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_address: "127.0.0.1:8080".parse()?,
//!         ..Default::default()
//!     };
//!
//!     let server = create_server_with_config(config, Collaborators::default());
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

// Public API exports
pub use collaborators::{
    Collaborators, CompletedGame, DiscardArchive, EndReason, GameArchive, JsonlGameArchive, LifecycleEvent,
    LifecycleSink, TracingLifecycleSink,
};
pub use config::{GameConfig, SecurityConfig, ServerConfig};
pub use engine::registry::ConnectionId;
pub use error::{CollaboratorError, ProtocolError, ServerError};
pub use server::GameServer;
pub use stats::{EngineStats, StatsSnapshot};
pub use utils::{create_server, create_server_with_config};

// Core modules
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod messaging;
pub mod security;
pub mod server;
pub mod stats;
pub mod utils;
