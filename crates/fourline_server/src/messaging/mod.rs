//! Wire protocol between clients and the session engine.
//!
//! This module provides the message types and the routing of validated
//! client frames into engine commands.

pub mod router;
pub mod types;

pub use router::route_client_message;
pub use types::{ClientMessage, Command, ServerMessage};
