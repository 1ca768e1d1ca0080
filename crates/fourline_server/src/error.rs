//! Error types and handling for the game server.
//!
//! This module defines the error types that can occur during server operations,
//! providing clear categorization of different failure modes.

/// Enumeration of possible server errors.
///
/// Categorizes errors into network-related and internal server errors to help
/// with debugging and error handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors such as a stopped engine task
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reasons an inbound protocol message is rejected before it reaches game state.
///
/// Every variant maps onto the text of an `ERROR` reply via
/// [`ProtocolError::client_message`]; none of them mutate engine state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("unknown message type `{0}`")]
    UnknownMessageType(String),

    #[error("invalid field `{field}`")]
    InvalidField {
        field: &'static str,
        message: &'static str,
    },

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("message too large: {0} bytes")]
    MessageTooLarge(usize),
}

impl ProtocolError {
    pub(crate) fn invalid(field: &'static str, message: &'static str) -> Self {
        ProtocolError::InvalidField { field, message }
    }

    /// Text sent back to the client in the `ERROR` message.
    pub fn client_message(&self) -> &'static str {
        match self {
            ProtocolError::MalformedMessage(_) => "Invalid message format",
            ProtocolError::UnknownMessageType(_) => "Unknown message type",
            ProtocolError::InvalidField { message, .. } => message,
            ProtocolError::RateLimited => "Too many messages, slow down!",
            ProtocolError::MessageTooLarge(_) => "Message too large",
        }
    }
}

/// Failures reported by the external collaborators. These are logged at the
/// call site and never reach players.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("failed to persist game {game_id}: {reason}")]
    Persistence { game_id: String, reason: String },

    #[error("failed to publish {kind} event: {reason}")]
    Publish { kind: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages() {
        assert_eq!(
            ProtocolError::MalformedMessage("eof".into()).client_message(),
            "Invalid message format"
        );
        assert_eq!(
            ProtocolError::RateLimited.client_message(),
            "Too many messages, slow down!"
        );
        assert_eq!(
            ProtocolError::invalid("column", "Invalid column").client_message(),
            "Invalid column"
        );
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = ProtocolError::invalid("gameId", "Invalid game");
        assert_eq!(err.to_string(), "invalid field `gameId`");
        let err = CollaboratorError::Persistence {
            game_id: "g1".into(),
            reason: "disk full".into(),
        };
        assert!(err.to_string().contains("disk full"));
    }
}
