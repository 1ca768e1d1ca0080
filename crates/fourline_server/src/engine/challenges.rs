//! Friend challenges: a pending handshake between two online names.
//!
//! A challenge lives until the target accepts or declines it, or until its
//! expiry timer fires, whichever comes first.

use super::orchestrator::Orchestrator;
use super::registry::ConnectionId;
use super::timers::{Ticket, TimerHandle, TimerKind};
use crate::messaging::ServerMessage;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: Uuid,
    pub from: String,
    pub to: String,
}

#[derive(Debug)]
struct PendingChallenge {
    challenge: Challenge,
    expiry: TimerHandle,
}

#[derive(Debug, Default)]
pub struct ChallengeRegistry {
    pending: HashMap<Uuid, PendingChallenge>,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, challenge: Challenge, expiry: TimerHandle) {
        self.pending
            .insert(challenge.id, PendingChallenge { challenge, expiry });
    }

    pub fn get(&self, id: &Uuid) -> Option<&Challenge> {
        self.pending.get(id).map(|pending| &pending.challenge)
    }

    /// Resolves a challenge and cancels its expiry.
    pub fn remove(&mut self, id: &Uuid) -> Option<Challenge> {
        let pending = self.pending.remove(id)?;
        pending.expiry.cancel();
        Some(pending.challenge)
    }

    fn take_expired(&mut self, id: &Uuid, ticket: Ticket) -> Option<Challenge> {
        match self.pending.get(id) {
            Some(pending) if pending.expiry.ticket() == ticket => {
                self.pending.remove(id).map(|pending| pending.challenge)
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.expiry.cancel();
        }
    }
}

impl Orchestrator {
    /// `CHALLENGE_FRIEND`: invite an online name to a private game.
    pub(crate) fn challenge_friend(&mut self, connection_id: ConnectionId, from: String, to: String) {
        if !self.registry.owns_name(connection_id, &from) {
            warn!("Connection {} tried to challenge as {}", connection_id, from);
            return;
        }
        if self.sessions.find_seat(&from).is_some() {
            self.registry
                .send(connection_id, ServerMessage::error("Already in a game"));
            return;
        }
        if !self.registry.is_online(&to) {
            self.registry
                .send(connection_id, ServerMessage::error("Friend is offline"));
            return;
        }

        let id = Uuid::new_v4();
        let expiry = self.timers.schedule(self.config.challenge_ttl(), |ticket| {
            TimerKind::ChallengeExpiry { challenge_id: id, ticket }
        });
        info!("⚔️ Challenge {}: {} -> {}", id, from, to);

        self.registry.send_to_name(
            &to,
            ServerMessage::ChallengeReceived {
                challenge_id: id,
                from: from.clone(),
            },
        );
        self.registry
            .send(connection_id, ServerMessage::ChallengeSent { to: to.clone() });
        self.challenges.insert(Challenge { id, from, to }, expiry);
    }

    /// `ACCEPT_CHALLENGE`: start the game if both sides are still around.
    pub(crate) fn accept_challenge(&mut self, connection_id: ConnectionId, challenge_id: Uuid) {
        let Some(challenge) = self.challenges.get(&challenge_id) else {
            debug!("Unknown challenge {}", challenge_id);
            return;
        };
        if !self.registry.owns_name(connection_id, &challenge.to) {
            warn!("Connection {} cannot accept challenge {}", connection_id, challenge_id);
            return;
        }
        let (Some(from_connection), Some(to_connection)) = (
            self.registry.connection_for(&challenge.from),
            self.registry.connection_for(&challenge.to),
        ) else {
            debug!("Challenge {} accepted while a party is offline", challenge_id);
            return;
        };

        let Some(challenge) = self.challenges.remove(&challenge_id) else {
            return;
        };
        let seated = self.sessions.find_seat(&challenge.from).is_some()
            || self.sessions.find_seat(&challenge.to).is_some();
        if seated {
            self.registry
                .send(connection_id, ServerMessage::error("Already in a game"));
            return;
        }

        info!("🎮 Challenge {} accepted: {} vs {}", challenge_id, challenge.from, challenge.to);
        self.start_human_session(
            (challenge.from, from_connection),
            (challenge.to, to_connection),
        );
    }

    /// `DECLINE_CHALLENGE`: drop the challenge and tell the sender.
    pub(crate) fn decline_challenge(&mut self, connection_id: ConnectionId, challenge_id: Uuid) {
        let Some(challenge) = self.challenges.get(&challenge_id) else {
            debug!("Unknown challenge {}", challenge_id);
            return;
        };
        if !self.registry.owns_name(connection_id, &challenge.to) {
            warn!("Connection {} cannot decline challenge {}", connection_id, challenge_id);
            return;
        }
        let Some(challenge) = self.challenges.remove(&challenge_id) else {
            return;
        };

        info!("🙅 Challenge {} declined by {}", challenge_id, challenge.to);
        self.registry.send_to_name(
            &challenge.from,
            ServerMessage::ChallengeDeclined { by: challenge.to },
        );
    }

    pub(crate) fn challenge_expired(&mut self, challenge_id: Uuid, ticket: Ticket) {
        let Some(challenge) = self.challenges.take_expired(&challenge_id, ticket) else {
            debug!("Stale challenge expiry {}", challenge_id);
            return;
        };

        info!("⌛ Challenge {} from {} expired", challenge.id, challenge.from);
        self.registry.send_to_name(
            &challenge.from,
            ServerMessage::ChallengeExpired {
                challenge_id: challenge.id,
                to: challenge.to,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::timers::TimerScheduler;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn challenge(from: &str, to: &str) -> Challenge {
        Challenge {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_resolves_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TimerScheduler::new(tx);
        let mut registry = ChallengeRegistry::new();

        let c = challenge("alice", "bob");
        let id = c.id;
        let expiry = timers.schedule(Duration::from_secs(60), |ticket| TimerKind::ChallengeExpiry { challenge_id: id, ticket });
        let ticket = expiry.ticket();
        registry.insert(c.clone(), expiry);

        assert_eq!(registry.get(&id), Some(&c));
        assert_eq!(registry.remove(&id), Some(c));
        assert_eq!(registry.remove(&id), None);
        assert_eq!(registry.take_expired(&id, ticket), None);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_requires_matching_ticket() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TimerScheduler::new(tx);
        let mut registry = ChallengeRegistry::new();

        let c = challenge("alice", "bob");
        let id = c.id;
        let expiry = timers.schedule(Duration::from_secs(60), |ticket| TimerKind::ChallengeExpiry { challenge_id: id, ticket });
        let ticket = expiry.ticket();
        registry.insert(c, expiry);

        assert_eq!(registry.take_expired(&id, ticket + 1), None);
        assert_eq!(registry.len(), 1);
        assert!(registry.take_expired(&id, ticket).is_some());
        assert_eq!(registry.len(), 0);
    }
}
