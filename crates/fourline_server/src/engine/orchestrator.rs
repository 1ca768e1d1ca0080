//! The session orchestrator: the one place engine state is mutated.
//!
//! [`Orchestrator::handle_event`] is called by the engine task for every
//! event in arrival order and runs to completion before the next one, so the
//! registry, queue, challenges, sessions and disconnect ledger never see
//! interleaved updates. Handlers for matchmaking, challenges and reconnection
//! live next to their state in the sibling modules.

use super::challenges::ChallengeRegistry;
use super::matchmaking::MatchmakingQueue;
use super::reconnect::DisconnectLedger;
use super::registry::{ConnectionId, ConnectionRegistry};
use super::session::{MoveOutcome, PlayerSlot, Session, SessionState, SessionStore, BOT_PLAYER};
use super::timers::{Ticket, TimerKind, TimerScheduler};
use super::EngineEvent;
use crate::collaborators::{Collaborators, CompletedGame, EndReason, LifecycleEvent};
use crate::config::{GameConfig, ServerConfig};
use crate::game::{self, Player};
use crate::messaging::{route_client_message, Command, ServerMessage};
use crate::security::{RateKey, SecurityManager};
use crate::stats::{EngineStats, Gauges};
use crate::utils::current_timestamp_millis;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct Orchestrator {
    pub(crate) config: GameConfig,
    pub(crate) security: SecurityManager,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) queue: MatchmakingQueue,
    pub(crate) challenges: ChallengeRegistry,
    pub(crate) sessions: SessionStore,
    pub(crate) disconnects: DisconnectLedger,
    pub(crate) timers: TimerScheduler,
    collaborators: Collaborators,
    stats: Arc<EngineStats>,
}

impl Orchestrator {
    /// Creates an orchestrator whose timers report back through `events`.
    pub fn new(
        config: &ServerConfig,
        events: UnboundedSender<EngineEvent>,
        collaborators: Collaborators,
        stats: Arc<EngineStats>,
    ) -> Self {
        Self {
            config: config.game.clone(),
            security: SecurityManager::new(config.security.clone()),
            registry: ConnectionRegistry::new(),
            queue: MatchmakingQueue::new(),
            challenges: ChallengeRegistry::new(),
            sessions: SessionStore::new(),
            disconnects: DisconnectLedger::new(),
            timers: TimerScheduler::new(events),
            collaborators,
            stats,
        }
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Connected {
                connection_id,
                remote_addr,
                outbox,
            } => self.registry.register(connection_id, remote_addr, outbox),
            EngineEvent::Inbound {
                connection_id,
                text,
            } => self.handle_inbound(connection_id, &text),
            EngineEvent::Disconnected { connection_id } => self.handle_disconnect(connection_id),
            EngineEvent::TimerFired(kind) => self.handle_timer(kind),
            EngineEvent::Shutdown => self.shutdown(),
        }
        self.refresh_gauges();
    }

    fn handle_inbound(&mut self, connection_id: ConnectionId, text: &str) {
        if !self.registry.contains(connection_id) {
            debug!("Message from unknown connection {}", connection_id);
            return;
        }

        let key = match self.registry.name_of(connection_id) {
            Some(name) => RateKey::Name(name.to_string()),
            None => RateKey::Connection(connection_id),
        };
        let command = match self.security.admit(key, text).and_then(route_client_message) {
            Ok(command) => command,
            Err(e) => {
                warn!("🚫 Rejected message from connection {}: {}", connection_id, e);
                self.registry
                    .send(connection_id, ServerMessage::error(e.client_message()));
                return;
            }
        };
        debug!("📨 {} from connection {}", command.kind(), connection_id);

        match command {
            Command::GoOnline { username } => self.go_online(connection_id, username),
            Command::Join { username } => self.join_matchmaking(connection_id, username),
            Command::ChallengeFriend { from, to } => self.challenge_friend(connection_id, from, to),
            Command::AcceptChallenge { challenge_id } => self.accept_challenge(connection_id, challenge_id),
            Command::DeclineChallenge { challenge_id } => self.decline_challenge(connection_id, challenge_id),
            Command::Move {
                game_id,
                column,
                player,
            } => self.play_move(connection_id, game_id, column, player),
        }
    }

    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        self.security.on_disconnect(connection_id);
        if let Some(name) = self.registry.unregister(connection_id) {
            self.player_went_offline(&name);
        }
    }

    fn handle_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::MatchmakingFallback { ticket } => self.matchmaking_fallback_fired(ticket),
            TimerKind::Forfeit { session_id, ticket } => self.forfeit_timer_fired(session_id, ticket),
            TimerKind::BotMove { session_id, ticket } => self.bot_move_fired(session_id, ticket),
            TimerKind::ChallengeExpiry {
                challenge_id,
                ticket,
            } => self.challenge_expired(challenge_id, ticket),
        }
    }

    /// Binds `name` to `connection_id`. If another connection owned the name,
    /// its waiting entry and seat move over to the new connection. A name this
    /// connection gives up goes offline as if its socket had closed.
    pub(crate) fn bind(&mut self, connection_id: ConnectionId, name: &str) {
        let binding = self.registry.bind_name(connection_id, name);
        if let Some(released) = binding.released {
            self.player_went_offline(&released);
        }
        let Some(previous) = binding.superseded else {
            return;
        };

        self.queue.move_connection(name, previous, connection_id);
        if let Some((session_id, seat)) = self.sessions.find_seat(name) {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                let slot = session.slot_mut(seat);
                if slot.connection == Some(previous) {
                    slot.connection = Some(connection_id);
                }
            }
        }
    }

    pub(crate) fn start_human_session(&mut self, first: (String, ConnectionId), second: (String, ConnectionId)) -> Uuid {
        let (first_name, first_connection) = first;
        let (second_name, second_connection) = second;
        self.queue.remove_name(&first_name);
        self.queue.remove_name(&second_name);

        let session = Session::new_human(
            Uuid::new_v4(),
            PlayerSlot {
                name: first_name,
                connection: Some(first_connection),
            },
            PlayerSlot {
                name: second_name,
                connection: Some(second_connection),
            },
            current_timestamp_millis(),
        );
        self.open_session(session)
    }

    pub(crate) fn start_bot_session(&mut self, name: String, connection_id: ConnectionId) -> Uuid {
        let session = Session::new_bot(
            Uuid::new_v4(),
            PlayerSlot {
                name,
                connection: Some(connection_id),
            },
            &self.config.bot_name,
            current_timestamp_millis(),
        );
        self.open_session(session)
    }

    /// Announces a new session to its players and the lifecycle sink, then stores it.
    fn open_session(&mut self, session: Session) -> Uuid {
        let id = session.id;
        for seat in [Player::One, Player::Two] {
            let Some(connection_id) = session.slot(seat).connection else {
                continue;
            };
            self.registry.send(
                connection_id,
                ServerMessage::MatchStart {
                    game_id: id,
                    opponent: session.slot(seat.other()).name.clone(),
                    symbol: seat,
                },
            );
            self.registry.send(
                connection_id,
                ServerMessage::BoardUpdate {
                    board: session.board,
                    turn: session.turn,
                },
            );
        }

        let players = session.player_names();
        info!("🎲 Game {} started: {} vs {}", id, players[0], players[1]);
        self.collaborators.emit(LifecycleEvent::GameStarted {
            game_id: id,
            players,
            started_at: session.started_at_ms,
        });
        self.stats.record_game_started();
        self.sessions.insert(session);
        id
    }

    /// `MOVE`: validate against the session and apply it.
    fn play_move(&mut self, connection_id: ConnectionId, game_id: Uuid, column: usize, player: Player) {
        let Some(session) = self.sessions.get_mut(&game_id) else {
            debug!("Move for unknown game {}", game_id);
            return;
        };
        if session.is_bot(player) || session.slot(player).connection != Some(connection_id) {
            warn!("Connection {} does not hold {} in game {}", connection_id, player, game_id);
            return;
        }
        if session.state() == SessionState::Paused {
            debug!("Game {} is paused, ignoring move", game_id);
            return;
        }

        match session.apply_move(column, player) {
            Ok(outcome) => self.after_move(game_id, outcome),
            Err(rejection) => debug!("Move rejected in game {}: {}", game_id, rejection),
        }
    }

    /// Ends the session on a terminal outcome, otherwise broadcasts the board
    /// and, in bot games, schedules the bot's reply.
    fn after_move(&mut self, session_id: Uuid, outcome: MoveOutcome) {
        match outcome {
            MoveOutcome::Won(winner) => self.end_session(session_id, Some(winner), EndReason::Win),
            MoveOutcome::Draw => self.end_session(session_id, None, EndReason::Draw),
            MoveOutcome::Continue => {
                let Some(session) = self.sessions.get_mut(&session_id) else {
                    return;
                };
                let update = ServerMessage::BoardUpdate {
                    board: session.board,
                    turn: session.turn,
                };
                for connection_id in session.connected_humans() {
                    self.registry.send(connection_id, update.clone());
                }

                if session.is_bot(session.turn) {
                    let handle = self
                        .timers
                        .schedule(self.config.bot_move_delay(), |ticket| TimerKind::BotMove { session_id, ticket });
                    if let Some(previous) = session.bot_timer.replace(handle) {
                        previous.cancel();
                    }
                }
            }
        }
    }

    fn bot_move_fired(&mut self, session_id: Uuid, ticket: Ticket) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            debug!("Bot timer for finished game {}", session_id);
            return;
        };
        if session.bot_timer.as_ref().map(|timer| timer.ticket()) != Some(ticket) {
            debug!("Stale bot timer {} for game {}", ticket, session_id);
            return;
        }
        session.bot_timer = None;
        if session.turn != BOT_PLAYER {
            return;
        }

        let Some(column) = game::choose_column(&session.board, BOT_PLAYER, BOT_PLAYER.other()) else {
            warn!("Bot has no legal move in game {}", session_id);
            return;
        };
        debug!("🤖 Bot plays column {} in game {}", column, session_id);
        match session.apply_move(column, BOT_PLAYER) {
            Ok(outcome) => self.after_move(session_id, outcome),
            Err(e) => error!("Bot produced an illegal move in game {}: {}", session_id, e),
        }
    }

    /// Terminal transition: notify both sides, hand the result to the
    /// collaborators, and forget the session.
    pub(crate) fn end_session(&mut self, session_id: Uuid, winner: Option<Player>, reason: EndReason) {
        let Some(mut session) = self.sessions.remove(&session_id) else {
            return;
        };
        session.cancel_timers();
        self.disconnects.remove_session(session_id);

        let game_over = ServerMessage::GameOver {
            winner,
            board: session.board,
        };
        for connection_id in session.connected_humans() {
            self.registry.send(connection_id, game_over.clone());
        }

        let winner_name = winner.map(|p| session.slot(p).name.clone());
        let loser_name = winner.map(|p| session.slot(p.other()).name.clone());
        let players = session.player_names();
        let ended_at = current_timestamp_millis();

        info!(
            "🏁 Game {} over ({:?}), winner: {}",
            session_id,
            reason,
            winner_name.as_deref().unwrap_or("none")
        );

        self.collaborators.persist(CompletedGame {
            id: session_id,
            player1: players[0].clone(),
            player2: players[1].clone(),
            winner: winner_name.clone(),
            started_at: session.started_at_ms,
            ended_at,
        });
        self.collaborators.emit(LifecycleEvent::GameEnded {
            game_id: session_id,
            winner: winner_name,
            loser: loser_name,
            players,
            duration_ms: u64::try_from(session.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            reason,
        });
        self.stats.record_game_completed(reason == EndReason::Forfeit);
    }

    /// Cancels every timer and closes every connection by dropping its outbox.
    fn shutdown(&mut self) {
        info!(
            "🛑 Engine stopping with {} active game(s) and {} connection(s)",
            self.sessions.len(),
            self.registry.connection_count()
        );
        self.queue.take();
        self.challenges.clear();
        for mut session in self.sessions.drain() {
            session.cancel_timers();
        }
        self.disconnects.clear();
        self.registry = ConnectionRegistry::new();
    }

    /// Periodic housekeeping driven by the engine loop.
    pub fn housekeeping(&mut self) {
        self.security.cleanup();
    }

    fn refresh_gauges(&self) {
        self.stats.update_gauges(Gauges {
            connections: self.registry.connection_count(),
            online_players: self.registry.online_count(),
            waiting_players: self.queue.len(),
            active_sessions: self.sessions.len(),
            pending_challenges: self.challenges.len(),
            rate_limited_messages: self.security.rate_limited_messages(),
        });
    }
}
