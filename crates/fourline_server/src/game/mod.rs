//! Pure game logic: the board rules and the bot heuristic. Nothing here touches I/O.

pub mod board;
pub mod bot;

pub use board::{Board, Cell, MoveError, Player, COLS, ROWS};
pub use bot::choose_column;
