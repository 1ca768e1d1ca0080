//! Game session store and the per-session turn state machine.

use super::registry::ConnectionId;
use super::timers::TimerHandle;
use crate::game::{Board, MoveError, Player};
use std::collections::HashMap;
use tokio::time::Instant;
use uuid::Uuid;

/// The bot always plays second.
pub const BOT_PLAYER: Player = Player::Two;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    HumanVsHuman,
    HumanVsBot,
}

/// Coarse session state. Terminal sessions are never stored, so only the two
/// live states appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// At least one human seat has lost its connection
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    pub name: String,
    /// `None` while the player is disconnected, and always for the bot
    pub connection: Option<ConnectionId>,
}

/// The grace timer armed for one disconnected seat.
#[derive(Debug)]
pub struct DisconnectTimer {
    pub slot: Player,
    pub handle: TimerHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Continue,
    Won(Player),
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    #[error("not {0}'s turn")]
    NotYourTurn(Player),
    #[error(transparent)]
    Board(#[from] MoveError),
}

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub board: Board,
    pub turn: Player,
    pub mode: GameMode,
    /// Wall-clock creation time in milliseconds since the Unix epoch
    pub started_at_ms: u64,
    pub started: Instant,
    pub disconnect_timer: Option<DisconnectTimer>,
    pub bot_timer: Option<TimerHandle>,
    slots: [PlayerSlot; 2],
}

impl Session {
    pub fn new_human(id: Uuid, first: PlayerSlot, second: PlayerSlot, started_at_ms: u64) -> Self {
        Self::with_slots(id, GameMode::HumanVsHuman, [first, second], started_at_ms)
    }

    pub fn new_bot(id: Uuid, human: PlayerSlot, bot_name: &str, started_at_ms: u64) -> Self {
        let bot = PlayerSlot {
            name: bot_name.to_string(),
            connection: None,
        };
        Self::with_slots(id, GameMode::HumanVsBot, [human, bot], started_at_ms)
    }

    fn with_slots(id: Uuid, mode: GameMode, slots: [PlayerSlot; 2], started_at_ms: u64) -> Self {
        Self {
            id,
            board: Board::new(),
            turn: Player::One,
            mode,
            started_at_ms,
            started: Instant::now(),
            disconnect_timer: None,
            bot_timer: None,
            slots,
        }
    }

    fn index(player: Player) -> usize {
        match player {
            Player::One => 0,
            Player::Two => 1,
        }
    }

    pub fn slot(&self, player: Player) -> &PlayerSlot {
        &self.slots[Self::index(player)]
    }

    pub fn slot_mut(&mut self, player: Player) -> &mut PlayerSlot {
        &mut self.slots[Self::index(player)]
    }

    pub fn is_bot_game(&self) -> bool {
        self.mode == GameMode::HumanVsBot
    }

    pub fn is_bot(&self, player: Player) -> bool {
        self.is_bot_game() && player == BOT_PLAYER
    }

    /// Seat held by `name`, ignoring the bot's synthetic seat.
    pub fn seat_of(&self, name: &str) -> Option<Player> {
        [Player::One, Player::Two]
            .into_iter()
            .find(|&p| !self.is_bot(p) && self.slot(p).name == name)
    }

    pub fn player_names(&self) -> [String; 2] {
        [self.slots[0].name.clone(), self.slots[1].name.clone()]
    }

    /// Connections of the human seats that are currently reachable.
    pub fn connected_humans(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.slots.iter().filter_map(|slot| slot.connection)
    }

    pub fn state(&self) -> SessionState {
        let paused = [Player::One, Player::Two]
            .into_iter()
            .any(|p| !self.is_bot(p) && self.slot(p).connection.is_none());
        if paused {
            SessionState::Paused
        } else {
            SessionState::Active
        }
    }

    /// Applies one move for `player`. A rejected move leaves the session untouched.
    pub fn apply_move(&mut self, column: usize, player: Player) -> Result<MoveOutcome, MoveRejection> {
        if self.turn != player {
            return Err(MoveRejection::NotYourTurn(player));
        }
        self.board.drop_disc(column, player)?;

        if self.board.check_win(player) {
            return Ok(MoveOutcome::Won(player));
        }
        if self.board.check_draw() {
            return Ok(MoveOutcome::Draw);
        }
        self.turn = player.other();
        Ok(MoveOutcome::Continue)
    }

    /// Cancels whatever timers the session still holds.
    pub fn cancel_timers(&mut self) {
        if let Some(timer) = self.disconnect_timer.take() {
            timer.handle.cancel();
        }
        if let Some(timer) = self.bot_timer.take() {
            timer.cancel();
        }
    }
}

/// All in-progress sessions, keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<Uuid, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    pub fn get(&self, id: &Uuid) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Session> {
        self.sessions.remove(id)
    }

    /// The session and seat a human `name` currently occupies.
    pub fn find_seat(&self, name: &str) -> Option<(Uuid, Player)> {
        self.sessions
            .values()
            .find_map(|session| session.seat_of(name).map(|seat| (session.id, seat)))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Session> + '_ {
        self.sessions.drain().map(|(_, session)| session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human_session() -> Session {
        Session::new_human(
            Uuid::new_v4(),
            PlayerSlot { name: "alice".into(), connection: Some(1) },
            PlayerSlot { name: "bob".into(), connection: Some(2) },
            0,
        )
    }

    #[tokio::test]
    async fn test_turns_alternate() {
        let mut session = human_session();
        assert_eq!(session.apply_move(3, Player::One), Ok(MoveOutcome::Continue));
        assert_eq!(session.turn, Player::Two);

        let before = session.board;
        assert_eq!(
            session.apply_move(3, Player::One),
            Err(MoveRejection::NotYourTurn(Player::One))
        );
        assert_eq!(session.board, before);
        assert_eq!(session.turn, Player::Two);
    }

    #[tokio::test]
    async fn test_full_column_keeps_turn() {
        let mut session = human_session();
        for _ in 0..3 {
            session.apply_move(0, Player::One).unwrap();
            session.apply_move(0, Player::Two).unwrap();
        }
        assert_eq!(
            session.apply_move(0, Player::One),
            Err(MoveRejection::Board(MoveError::ColumnFull))
        );
        assert_eq!(session.turn, Player::One);
    }

    #[tokio::test]
    async fn test_vertical_win_is_reported() {
        let mut session = human_session();
        for _ in 0..3 {
            session.apply_move(0, Player::One).unwrap();
            session.apply_move(1, Player::Two).unwrap();
        }
        assert_eq!(session.apply_move(0, Player::One), Ok(MoveOutcome::Won(Player::One)));
    }

    #[tokio::test]
    async fn test_pause_state_and_seats() {
        let mut session = human_session();
        assert_eq!(session.state(), SessionState::Active);
        session.slot_mut(Player::Two).connection = None;
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(session.seat_of("bob"), Some(Player::Two));
        assert_eq!(session.connected_humans().collect::<Vec<_>>(), vec![1]);

        let bot = Session::new_bot(
            Uuid::new_v4(),
            PlayerSlot { name: "carol".into(), connection: Some(5) },
            "Rose",
            0,
        );
        assert_eq!(bot.state(), SessionState::Active);
        assert_eq!(bot.seat_of("Rose"), None);
        assert!(bot.is_bot(Player::Two));
    }

    #[tokio::test]
    async fn test_store_finds_seats() {
        let mut store = SessionStore::new();
        let session = human_session();
        let id = session.id;
        store.insert(session);
        assert_eq!(store.find_seat("bob"), Some((id, Player::Two)));
        assert_eq!(store.find_seat("zed"), None);
        assert!(store.remove(&id).is_some());
        assert!(store.is_empty());
    }
}
