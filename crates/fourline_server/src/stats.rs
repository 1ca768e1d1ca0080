//! Engine counters shared with the application for periodic health logging.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Live counters written by the engine task and read from anywhere.
#[derive(Debug, Default)]
pub struct EngineStats {
    connections: AtomicUsize,
    online_players: AtomicUsize,
    waiting_players: AtomicUsize,
    active_sessions: AtomicUsize,
    pending_challenges: AtomicUsize,
    games_started: AtomicU64,
    games_completed: AtomicU64,
    forfeits: AtomicU64,
    rate_limited_messages: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connections: usize,
    pub online_players: usize,
    pub waiting_players: usize,
    pub active_sessions: usize,
    pub pending_challenges: usize,
    pub games_started: u64,
    pub games_completed: u64,
    pub forfeits: u64,
    pub rate_limited_messages: u64,
}

/// Gauges the engine refreshes after every event.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Gauges {
    pub connections: usize,
    pub online_players: usize,
    pub waiting_players: usize,
    pub active_sessions: usize,
    pub pending_challenges: usize,
    pub rate_limited_messages: u64,
}

impl EngineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn update_gauges(&self, gauges: Gauges) {
        self.connections.store(gauges.connections, Ordering::Relaxed);
        self.online_players.store(gauges.online_players, Ordering::Relaxed);
        self.waiting_players.store(gauges.waiting_players, Ordering::Relaxed);
        self.active_sessions.store(gauges.active_sessions, Ordering::Relaxed);
        self.pending_challenges.store(gauges.pending_challenges, Ordering::Relaxed);
        self.rate_limited_messages
            .store(gauges.rate_limited_messages, Ordering::Relaxed);
    }

    pub(crate) fn record_game_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_game_completed(&self, forfeit: bool) {
        self.games_completed.fetch_add(1, Ordering::Relaxed);
        if forfeit {
            self.forfeits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            online_players: self.online_players.load(Ordering::Relaxed),
            waiting_players: self.waiting_players.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            pending_challenges: self.pending_challenges.load(Ordering::Relaxed),
            games_started: self.games_started.load(Ordering::Relaxed),
            games_completed: self.games_completed.load(Ordering::Relaxed),
            forfeits: self.forfeits.load(Ordering::Relaxed),
            rate_limited_messages: self.rate_limited_messages.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_gauges() {
        let stats = EngineStats::new();
        stats.record_game_started();
        stats.record_game_completed(false);
        stats.record_game_completed(true);
        stats.update_gauges(Gauges {
            online_players: 3,
            active_sessions: 1,
            ..Gauges::default()
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.games_started, 1);
        assert_eq!(snapshot.games_completed, 2);
        assert_eq!(snapshot.forfeits, 1);
        assert_eq!(snapshot.online_players, 3);
        assert_eq!(snapshot.active_sessions, 1);
        assert_eq!(snapshot.waiting_players, 0);
    }
}
