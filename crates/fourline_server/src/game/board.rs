//! Board and rules engine.
//!
//! A fixed 6x7 grid filled bottom-up. Row 0 is the top row, row 5 the bottom,
//! which is also the orientation the board is serialized in on the wire.

use serde::{Deserialize, Serialize};

pub const ROWS: usize = 6;
pub const COLS: usize = 7;

/// The four line directions checked for a run: horizontal, vertical and both diagonals.
pub(crate) const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// One of the two seats in a session. Serialized as `"P1"` / `"P2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    #[serde(rename = "P1")]
    One,
    #[serde(rename = "P2")]
    Two,
}

impl Player {
    pub fn other(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Player::One => "P1",
            Player::Two => "P2",
        }
    }

    /// Parses the wire symbol (`"P1"` / `"P2"`).
    pub fn from_symbol(symbol: &str) -> Option<Player> {
        match symbol {
            "P1" => Some(Player::One),
            "P2" => Some(Player::Two),
            _ => None,
        }
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `None` is an empty cell.
pub type Cell = Option<Player>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("column is full")]
    ColumnFull,
    #[error("column {0} is outside the board")]
    InvalidColumn(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; COLS]; ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Board {
            cells: [[None; COLS]; ROWS],
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.cells[row][col]
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, cell: Cell) {
        self.cells[row][col] = cell;
    }

    pub fn is_column_full(&self, col: usize) -> bool {
        col >= COLS || self.cells[0][col].is_some()
    }

    /// Row the next disc dropped into `col` would land in.
    pub fn landing_row(&self, col: usize) -> Option<usize> {
        if col >= COLS {
            return None;
        }
        (0..ROWS).rev().find(|&row| self.cells[row][col].is_none())
    }

    /// Columns that can still take a disc, left to right.
    pub fn open_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLS).filter(move |&col| !self.is_column_full(col))
    }

    /// Drops a disc into `col` and returns the `(row, col)` it landed on.
    pub fn drop_disc(&mut self, col: usize, player: Player) -> Result<(usize, usize), MoveError> {
        if col >= COLS {
            return Err(MoveError::InvalidColumn(col));
        }
        let row = self.landing_row(col).ok_or(MoveError::ColumnFull)?;
        self.cells[row][col] = Some(player);
        Ok((row, col))
    }

    /// True if `player` owns some run of four consecutive cells.
    pub fn check_win(&self, player: Player) -> bool {
        for row in 0..ROWS {
            for col in 0..COLS {
                if self.cells[row][col] != Some(player) {
                    continue;
                }
                for (dr, dc) in DIRECTIONS {
                    if self.run_from(row, col, dr, dc, player) >= 4 {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// True once the top row is filled; gravity guarantees nothing below is empty.
    pub fn check_draw(&self) -> bool {
        self.cells[0].iter().all(Option::is_some)
    }

    /// Counts up to four consecutive `player` cells starting at `(row, col)`.
    fn run_from(&self, row: usize, col: usize, dr: isize, dc: isize, player: Player) -> usize {
        (0..4)
            .take_while(|&i| {
                self.offset(row, col, dr * i, dc * i)
                    .map_or(false, |(r, c)| self.cells[r][c] == Some(player))
            })
            .count()
    }

    /// Number of `player` cells adjacent to `(row, col)` walking in one direction.
    pub(crate) fn count_direction(&self, row: usize, col: usize, dr: isize, dc: isize, player: Player) -> usize {
        let mut count = 0;
        let mut step = 1;
        while let Some((r, c)) = self.offset(row, col, dr * step, dc * step) {
            if self.cells[r][c] != Some(player) {
                break;
            }
            count += 1;
            step += 1;
        }
        count
    }

    fn offset(&self, row: usize, col: usize, dr: isize, dc: isize) -> Option<(usize, usize)> {
        let r = row as isize + dr;
        let c = col as isize + dc;
        if (0..ROWS as isize).contains(&r) && (0..COLS as isize).contains(&c) {
            Some((r as usize, c as usize))
        } else {
            None
        }
    }
}
