//! Turns a structurally valid JSON frame into a typed [`Command`].
//!
//! Field checks mirror what the clients expect back: each bad field has its
//! own `ERROR` text, and unknown message kinds are reported separately from
//! unparsable ones.

use crate::error::ProtocolError;
use crate::game::{Player, COLS};
use crate::messaging::types::{ClientMessage, Command, CLIENT_MESSAGE_TYPES};
use crate::security::{parse_uuid, sanitize_username};
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

/// Routes a parsed client frame to the command it requests.
pub fn route_client_message(json: Value) -> Result<Command, ProtocolError> {
    let kind = json
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::MalformedMessage("missing `type`".to_string()))?;

    if !CLIENT_MESSAGE_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownMessageType(kind.to_string()));
    }
    trace!("📨 Routing {} message", kind);

    let message: ClientMessage = serde_json::from_value(json)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;

    match message {
        ClientMessage::GoOnline { username } => Ok(Command::GoOnline {
            username: username_field(&username)?,
        }),
        ClientMessage::Join { username } => Ok(Command::Join {
            username: username_field(&username)?,
        }),
        ClientMessage::ChallengeFriend { from, to } => {
            let (Some(from), Some(to)) = (from.as_str(), to.as_str()) else {
                return Err(ProtocolError::invalid("from", "Invalid challenge data"));
            };
            match (sanitize_username(from), sanitize_username(to)) {
                (Some(from), Some(to)) if from != to => Ok(Command::ChallengeFriend { from, to }),
                _ => Err(ProtocolError::invalid("to", "Invalid usernames")),
            }
        }
        ClientMessage::AcceptChallenge { challenge_id } => Ok(Command::AcceptChallenge {
            challenge_id: uuid_field(&challenge_id, "challengeId", "Invalid challenge")?,
        }),
        ClientMessage::DeclineChallenge { challenge_id } => Ok(Command::DeclineChallenge {
            challenge_id: uuid_field(&challenge_id, "challengeId", "Invalid challenge")?,
        }),
        ClientMessage::Move { game_id, column, player } => Ok(Command::Move {
            game_id: uuid_field(&game_id, "gameId", "Invalid game")?,
            column: column_field(&column)?,
            player: player
                .as_str()
                .and_then(Player::from_symbol)
                .ok_or(ProtocolError::invalid("player", "Invalid player"))?,
        }),
    }
}

fn username_field(value: &Value) -> Result<String, ProtocolError> {
    value
        .as_str()
        .and_then(sanitize_username)
        .ok_or(ProtocolError::invalid("username", "Invalid username"))
}

fn uuid_field(value: &Value, field: &'static str, message: &'static str) -> Result<Uuid, ProtocolError> {
    value
        .as_str()
        .and_then(parse_uuid)
        .ok_or(ProtocolError::invalid(field, message))
}

/// Accepts integral numbers in `[0, COLS)`, including integral floats such as `3.0`.
fn column_field(value: &Value) -> Result<usize, ProtocolError> {
    let invalid = ProtocolError::invalid("column", "Invalid column");
    let column = match value.as_u64() {
        Some(n) => n,
        None => match value.as_f64() {
            Some(f) if f >= 0.0 && f.fract() == 0.0 => f as u64,
            _ => return Err(invalid),
        },
    };
    usize::try_from(column)
        .ok()
        .filter(|&c| c < COLS)
        .ok_or(invalid)
}
