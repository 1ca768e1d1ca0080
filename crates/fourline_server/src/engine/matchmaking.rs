//! Random matchmaking: a single waiting seat plus the timer that hands a
//! lonely player over to the bot.

use super::orchestrator::Orchestrator;
use super::registry::ConnectionId;
use super::timers::{Ticket, TimerHandle, TimerKind};
use crate::messaging::ServerMessage;
use tracing::{debug, info};

#[derive(Debug)]
pub struct WaitingEntry {
    pub name: String,
    pub connection: ConnectionId,
    fallback: TimerHandle,
}

/// Holds at most one waiting player. The entry and its fallback timer are
/// created and cleared together.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    waiting: Option<WaitingEntry>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waiting_name(&self) -> Option<&str> {
        self.waiting.as_ref().map(|entry| entry.name.as_str())
    }

    pub fn is_waiting(&self, name: &str) -> bool {
        self.waiting_name() == Some(name)
    }

    pub fn len(&self) -> usize {
        usize::from(self.waiting.is_some())
    }

    fn enqueue(&mut self, name: String, connection: ConnectionId, fallback: TimerHandle) {
        if let Some(previous) = self.waiting.replace(WaitingEntry { name, connection, fallback }) {
            previous.fallback.cancel();
        }
    }

    /// Removes the waiting entry and cancels its fallback timer.
    pub fn take(&mut self) -> Option<(String, ConnectionId)> {
        let entry = self.waiting.take()?;
        entry.fallback.cancel();
        Some((entry.name, entry.connection))
    }

    /// Removes `name` if it is the one waiting.
    pub fn remove_name(&mut self, name: &str) -> bool {
        if self.is_waiting(name) {
            self.take();
            true
        } else {
            false
        }
    }

    /// Claims the entry for a fallback firing, if the firing is still current.
    fn take_fired(&mut self, ticket: Ticket) -> Option<WaitingEntry> {
        match &self.waiting {
            Some(entry) if entry.fallback.ticket() == ticket => self.waiting.take(),
            _ => None,
        }
    }

    /// Points the waiting entry at a new connection for the same name.
    pub fn move_connection(&mut self, name: &str, from: ConnectionId, to: ConnectionId) {
        if let Some(entry) = self.waiting.as_mut() {
            if entry.name == name && entry.connection == from {
                entry.connection = to;
            }
        }
    }
}

impl Orchestrator {
    /// `JOIN`: wait for the next player, or pair with whoever is already waiting.
    pub(crate) fn join_matchmaking(&mut self, connection_id: ConnectionId, username: String) {
        self.bind(connection_id, &username);

        if self.sessions.find_seat(&username).is_some() {
            self.registry
                .send(connection_id, ServerMessage::error("Already in a game"));
            return;
        }

        let waiting = self.queue.waiting_name().map(str::to_owned);
        match waiting.as_deref() {
            Some(waiting) if waiting == username => {
                // bind() has already pointed the entry at this connection
                debug!("{} re-joined matchmaking", username);
                self.registry.send(connection_id, ServerMessage::waiting());
            }
            Some(_) => {
                let Some((first_name, first_connection)) = self.queue.take() else {
                    return;
                };
                info!("🤝 Pairing {} with {}", first_name, username);
                self.start_human_session((first_name, first_connection), (username, connection_id));
            }
            None => {
                let delay = self.config.matchmaking_fallback();
                let fallback = self
                    .timers
                    .schedule(delay, |ticket| TimerKind::MatchmakingFallback { ticket });
                info!("⏳ {} waiting for an opponent", username);
                self.queue.enqueue(username, connection_id, fallback);
                self.registry.send(connection_id, ServerMessage::waiting());
            }
        }
    }

    /// Nobody showed up in time: the waiting player gets the bot.
    pub(crate) fn matchmaking_fallback_fired(&mut self, ticket: Ticket) {
        let Some(entry) = self.queue.take_fired(ticket) else {
            debug!("Stale matchmaking fallback {}", ticket);
            return;
        };
        info!("🤖 No opponent for {}, starting bot game", entry.name);
        self.start_bot_session(entry.name, entry.connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::timers::TimerScheduler;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_entry_and_timer_clear_together() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TimerScheduler::new(tx);
        let mut queue = MatchmakingQueue::new();

        let timer = timers.schedule(Duration::from_secs(10), |ticket| TimerKind::MatchmakingFallback { ticket });
        let ticket = timer.ticket();
        queue.enqueue("alice".into(), 1, timer);
        assert!(queue.is_waiting("alice"));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.take(), Some(("alice".to_string(), 1)));
        assert_eq!(queue.len(), 0);
        // A firing that was already queued is now stale
        assert!(queue.take_fired(ticket).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_fired_checks_ticket() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TimerScheduler::new(tx);
        let mut queue = MatchmakingQueue::new();

        let timer = timers.schedule(Duration::from_secs(10), |ticket| TimerKind::MatchmakingFallback { ticket });
        let ticket = timer.ticket();
        queue.enqueue("alice".into(), 1, timer);
        assert!(queue.take_fired(ticket + 100).is_none());
        assert!(queue.is_waiting("alice"));

        queue.move_connection("alice", 1, 4);
        let entry = queue.take_fired(ticket).unwrap();
        assert_eq!(entry.connection, 4);
        assert!(queue.waiting_name().is_none());
    }
}
