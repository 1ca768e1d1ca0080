//! Message type definitions for client-server communication.
//!
//! Every frame is one JSON object with a `type` discriminator, e.g.
//!
//! ```json
//! { "type": "MOVE", "gameId": "0b6f3c8e-5d1a-4c57-9a52-0e4f7f1d2c3a", "column": 3, "player": "P1" }
//! ```
//!
//! Inbound frames are first deserialized into the loosely typed
//! [`ClientMessage`], whose fields are validated one by one into a [`Command`].
//! Outbound frames are [`ServerMessage`] values.

use crate::game::{Board, Player};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A message sent from a client to the server, before field validation.
///
/// Fields are kept as raw JSON so a missing or mistyped field produces the
/// field-specific `ERROR` reply instead of a generic parse failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    GoOnline {
        #[serde(default)]
        username: Value,
    },
    Join {
        #[serde(default)]
        username: Value,
    },
    ChallengeFriend {
        #[serde(default)]
        from: Value,
        #[serde(default)]
        to: Value,
    },
    AcceptChallenge {
        #[serde(default, rename = "challengeId")]
        challenge_id: Value,
    },
    DeclineChallenge {
        #[serde(default, rename = "challengeId")]
        challenge_id: Value,
    },
    Move {
        #[serde(default, rename = "gameId")]
        game_id: Value,
        #[serde(default)]
        column: Value,
        #[serde(default)]
        player: Value,
    },
}

/// Wire names of every inbound message kind.
pub const CLIENT_MESSAGE_TYPES: [&str; 6] = [
    "GO_ONLINE",
    "JOIN",
    "CHALLENGE_FRIEND",
    "ACCEPT_CHALLENGE",
    "DECLINE_CHALLENGE",
    "MOVE",
];

/// A fully validated inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GoOnline { username: String },
    Join { username: String },
    ChallengeFriend { from: String, to: String },
    AcceptChallenge { challenge_id: Uuid },
    DeclineChallenge { challenge_id: Uuid },
    Move { game_id: Uuid, column: usize, player: Player },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::GoOnline { .. } => "GO_ONLINE",
            Command::Join { .. } => "JOIN",
            Command::ChallengeFriend { .. } => "CHALLENGE_FRIEND",
            Command::AcceptChallenge { .. } => "ACCEPT_CHALLENGE",
            Command::DeclineChallenge { .. } => "DECLINE_CHALLENGE",
            Command::Move { .. } => "MOVE",
        }
    }
}

/// A message sent from the server to one client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Online {
        username: String,
    },
    Waiting {
        message: String,
    },
    MatchStart {
        #[serde(rename = "gameId")]
        game_id: Uuid,
        opponent: String,
        symbol: Player,
    },
    BoardUpdate {
        board: Board,
        turn: Player,
    },
    GameOver {
        winner: Option<Player>,
        board: Board,
    },
    Reconnected {
        #[serde(rename = "gameId")]
        game_id: Uuid,
        symbol: Player,
        opponent: String,
        board: Board,
        turn: Player,
    },
    OpponentDisconnected {
        message: String,
    },
    OpponentReconnected {
        message: String,
    },
    OpponentForfeited {
        message: String,
    },
    ChallengeReceived {
        #[serde(rename = "challengeId")]
        challenge_id: Uuid,
        from: String,
    },
    ChallengeSent {
        to: String,
    },
    ChallengeDeclined {
        by: String,
    },
    ChallengeExpired {
        #[serde(rename = "challengeId")]
        challenge_id: Uuid,
        to: String,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    pub fn waiting() -> Self {
        ServerMessage::Waiting {
            message: "Waiting for opponent...".to_string(),
        }
    }

    pub fn opponent_disconnected(grace_secs: u64) -> Self {
        ServerMessage::OpponentDisconnected {
            message: format!("Opponent disconnected. Waiting {grace_secs}s..."),
        }
    }

    pub fn opponent_reconnected() -> Self {
        ServerMessage::OpponentReconnected {
            message: "Opponent has reconnected!".to_string(),
        }
    }

    pub fn opponent_forfeited() -> Self {
        ServerMessage::OpponentForfeited {
            message: "Opponent disconnected. You win!".to_string(),
        }
    }

    /// Serializes the message into the JSON text sent over the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of the message, mostly for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Online { .. } => "ONLINE",
            ServerMessage::Waiting { .. } => "WAITING",
            ServerMessage::MatchStart { .. } => "MATCH_START",
            ServerMessage::BoardUpdate { .. } => "BOARD_UPDATE",
            ServerMessage::GameOver { .. } => "GAME_OVER",
            ServerMessage::Reconnected { .. } => "RECONNECTED",
            ServerMessage::OpponentDisconnected { .. } => "OPPONENT_DISCONNECTED",
            ServerMessage::OpponentReconnected { .. } => "OPPONENT_RECONNECTED",
            ServerMessage::OpponentForfeited { .. } => "OPPONENT_FORFEITED",
            ServerMessage::ChallengeReceived { .. } => "CHALLENGE_RECEIVED",
            ServerMessage::ChallengeSent { .. } => "CHALLENGE_SENT",
            ServerMessage::ChallengeDeclined { .. } => "CHALLENGE_DECLINED",
            ServerMessage::ChallengeExpired { .. } => "CHALLENGE_EXPIRED",
            ServerMessage::Error { .. } => "ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_start_wire_shape() {
        let id = Uuid::new_v4();
        let msg = ServerMessage::MatchStart {
            game_id: id,
            opponent: "Rose".into(),
            symbol: Player::One,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "MATCH_START", "gameId": id.to_string(), "opponent": "Rose", "symbol": "P1"})
        );
    }

    #[test]
    fn test_game_over_draw_has_null_winner() {
        let msg = ServerMessage::GameOver { winner: None, board: Board::new() };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "GAME_OVER");
        assert!(value["winner"].is_null());
        assert_eq!(value["board"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_opponent_messages_carry_text() {
        let value = serde_json::to_value(ServerMessage::opponent_disconnected(30)).unwrap();
        assert_eq!(
            value,
            json!({"type": "OPPONENT_DISCONNECTED", "message": "Opponent disconnected. Waiting 30s..."})
        );
        assert_eq!(ServerMessage::opponent_forfeited().kind(), "OPPONENT_FORFEITED");
    }

    #[test]
    fn test_client_message_missing_fields_default_to_null() {
        let msg: ClientMessage = serde_json::from_value(json!({"type": "MOVE", "column": 2})).unwrap();
        match msg {
            ClientMessage::Move { game_id, column, player } => {
                assert!(game_id.is_null());
                assert_eq!(column, 2);
                assert!(player.is_null());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
