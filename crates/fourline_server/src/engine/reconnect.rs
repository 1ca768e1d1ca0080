//! Disconnect, reconnect and forfeit handling.
//!
//! When a seated player's connection closes the session is paused, the
//! opponent is told, and a grace timer starts. Announcing the same name again
//! before the timer fires restores the seat; otherwise the absent player
//! forfeits. A session only ever carries one grace timer.

use super::orchestrator::Orchestrator;
use super::registry::ConnectionId;
use super::session::{DisconnectTimer, SessionState};
use super::timers::{Ticket, TimerKind};
use crate::collaborators::EndReason;
use crate::game::Player;
use crate::messaging::ServerMessage;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectEntry {
    pub session_id: Uuid,
    pub slot: Player,
    pub disconnected_at: Instant,
}

/// Disconnected players, at most one entry per display name.
#[derive(Debug, Default)]
pub struct DisconnectLedger {
    entries: HashMap<String, DisconnectEntry>,
}

impl DisconnectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, entry: DisconnectEntry) {
        self.entries.insert(name, entry);
    }

    pub fn get(&self, name: &str) -> Option<&DisconnectEntry> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<DisconnectEntry> {
        self.entries.remove(name)
    }

    /// Drops every entry pointing at a session that has ended.
    pub fn remove_session(&mut self, session_id: Uuid) {
        self.entries.retain(|_, entry| entry.session_id != session_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Orchestrator {
    /// `GO_ONLINE`: announce presence and resume a paused game if there is one.
    pub(crate) fn go_online(&mut self, connection_id: ConnectionId, username: String) {
        self.bind(connection_id, &username);
        info!("🟢 {} is online", username);

        if self.try_reconnect(connection_id, &username) {
            return;
        }
        self.registry
            .send(connection_id, ServerMessage::Online { username });
    }

    /// Restores `name` into the session it dropped out of. Returns false when
    /// there is nothing to resume.
    fn try_reconnect(&mut self, connection_id: ConnectionId, name: &str) -> bool {
        let Some(entry) = self.disconnects.remove(name) else {
            return false;
        };
        let Some(session) = self.sessions.get_mut(&entry.session_id) else {
            warn!("Dropping stale reconnect entry for {} (game {} is over)", name, entry.session_id);
            return false;
        };

        let slot = entry.slot;
        let opponent = slot.other();
        session.slot_mut(slot).connection = Some(connection_id);

        if session.disconnect_timer.as_ref().map(|timer| timer.slot) == Some(slot) {
            if let Some(timer) = session.disconnect_timer.take() {
                timer.handle.cancel();
            }
        }

        // The opponent may have dropped too while this seat was away
        let opponent_absent = session.slot(opponent).connection.is_none();
        if opponent_absent && session.disconnect_timer.is_none() {
            let session_id = session.id;
            let handle = self
                .timers
                .schedule(self.config.reconnect_grace(), |ticket| TimerKind::Forfeit { session_id, ticket });
            session.disconnect_timer = Some(DisconnectTimer { slot: opponent, handle });
        }

        info!(
            "🔄 {} reconnected to game {} after {:?}",
            name,
            session.id,
            entry.disconnected_at.elapsed()
        );

        self.registry.send(
            connection_id,
            ServerMessage::Reconnected {
                game_id: session.id,
                symbol: slot,
                opponent: session.slot(opponent).name.clone(),
                board: session.board,
                turn: session.turn,
            },
        );
        match session.slot(opponent).connection {
            Some(opponent_connection) => {
                self.registry
                    .send(opponent_connection, ServerMessage::opponent_reconnected());
            }
            None => {
                self.registry.send(
                    connection_id,
                    ServerMessage::opponent_disconnected(self.config.reconnect_grace().as_secs()),
                );
            }
        }
        true
    }

    /// A connection that owned `name` has closed.
    pub(crate) fn player_went_offline(&mut self, name: &str) {
        info!("👋 {} went offline", name);

        if self.queue.remove_name(name) {
            debug!("{} left the matchmaking queue", name);
        }

        let Some((session_id, slot)) = self.sessions.find_seat(name) else {
            return;
        };

        let is_bot_game = self
            .sessions
            .get(&session_id)
            .map_or(false, |session| session.is_bot_game());
        if is_bot_game {
            if let Some(mut session) = self.sessions.remove(&session_id) {
                session.cancel_timers();
                info!("🗑️ Bot game {} abandoned by {}", session_id, name);
            }
            return;
        }

        self.pause_seat(session_id, slot, name);
    }

    fn pause_seat(&mut self, session_id: Uuid, slot: Player, name: &str) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return;
        };
        session.slot_mut(slot).connection = None;

        let grace = self.config.reconnect_grace();
        if let Some(opponent_connection) = session.slot(slot.other()).connection {
            self.registry
                .send(opponent_connection, ServerMessage::opponent_disconnected(grace.as_secs()));
        }

        if session.disconnect_timer.is_none() {
            let handle = self
                .timers
                .schedule(grace, |ticket| TimerKind::Forfeit { session_id, ticket });
            session.disconnect_timer = Some(DisconnectTimer { slot, handle });
        }
        debug_assert_eq!(session.state(), SessionState::Paused);

        info!("⏸️ {} disconnected from game {}, {}s to reconnect", name, session_id, grace.as_secs());
        self.disconnects.insert(
            name.to_string(),
            DisconnectEntry {
                session_id,
                slot,
                disconnected_at: Instant::now(),
            },
        );
    }

    /// Grace period over: the absent seat loses.
    pub(crate) fn forfeit_timer_fired(&mut self, session_id: Uuid, ticket: Ticket) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            debug!("Forfeit timer for finished game {}", session_id);
            return;
        };
        let current = session.disconnect_timer.as_ref().map(|timer| timer.handle.ticket());
        if current != Some(ticket) {
            debug!("Stale forfeit timer {} for game {}", ticket, session_id);
            return;
        }
        let Some(timer) = session.disconnect_timer.take() else {
            return;
        };

        let winner = timer.slot.other();
        info!(
            "🏳️ {} did not reconnect, forfeiting game {}",
            session.slot(timer.slot).name,
            session_id
        );
        if let Some(winner_connection) = session.slot(winner).connection {
            self.registry
                .send(winner_connection, ServerMessage::opponent_forfeited());
        }

        self.disconnects.remove_session(session_id);
        self.end_session(session_id, Some(winner), EndReason::Forfeit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ledger_keeps_one_entry_per_name() {
        let mut ledger = DisconnectLedger::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        ledger.insert(
            "alice".into(),
            DisconnectEntry { session_id: first, slot: Player::One, disconnected_at: Instant::now() },
        );
        ledger.insert(
            "alice".into(),
            DisconnectEntry { session_id: second, slot: Player::Two, disconnected_at: Instant::now() },
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("alice").map(|e| e.session_id), Some(second));
    }

    #[tokio::test]
    async fn test_remove_session_clears_both_players() {
        let mut ledger = DisconnectLedger::new();
        let game = Uuid::new_v4();
        for (name, slot) in [("alice", Player::One), ("bob", Player::Two)] {
            ledger.insert(
                name.into(),
                DisconnectEntry { session_id: game, slot, disconnected_at: Instant::now() },
            );
        }
        ledger.insert(
            "carol".into(),
            DisconnectEntry { session_id: Uuid::new_v4(), slot: Player::One, disconnected_at: Instant::now() },
        );

        ledger.remove_session(game);
        assert!(ledger.get("alice").is_none());
        assert!(ledger.get("bob").is_none());
        assert!(ledger.remove("carol").is_some());
        assert!(ledger.is_empty());
    }
}
