//! Opponent heuristic used when no human is paired.
//!
//! The bot picks a column with a fixed priority cascade: win now, block an
//! immediate loss, create a fork, deny the opponent's fork, and otherwise play
//! the best-scoring column. Every step works on copies of the board.

use super::board::{Board, Player, COLS, DIRECTIONS};

const BLUNDER_PENALTY: i32 = -800;
const RUN_FOUR_BONUS: i32 = 900;
const RUN_THREE_BONUS: i32 = 45;
const RUN_TWO_BONUS: i32 = 12;
const PRESSURE_THREE: i32 = 8;
const PRESSURE_TWO: i32 = 3;
const CENTER_WEIGHT: i32 = 2;
const DEPTH_WEIGHT: i32 = 2;

/// Selects the bot's next column, or `None` when the board has no open column.
pub fn choose_column(board: &Board, bot: Player, opponent: Player) -> Option<usize> {
    if let Some(col) = find_winning_column(board, bot) {
        return Some(col);
    }
    if let Some(col) = find_winning_column(board, opponent) {
        return Some(col);
    }
    if let Some(col) = find_fork(board, bot) {
        if !is_blunder(board, col, bot, opponent) {
            return Some(col);
        }
    }
    if let Some(col) = find_fork(board, opponent) {
        if !is_blunder(board, col, bot, opponent) {
            return Some(col);
        }
    }

    let mut best: Option<(usize, i32)> = None;
    for col in 0..COLS {
        let Some(score) = evaluate_column(board, col, bot, opponent) else {
            continue;
        };
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((col, score));
        }
    }
    best.map(|(col, _)| col)
}

/// First column where a drop by `player` wins immediately.
fn find_winning_column(board: &Board, player: Player) -> Option<usize> {
    board.open_columns().find(|&col| {
        let mut trial = *board;
        trial.drop_disc(col, player).is_ok() && trial.check_win(player)
    })
}

/// First column after which `player` has at least two distinct winning replies.
fn find_fork(board: &Board, player: Player) -> Option<usize> {
    board.open_columns().find(|&col| {
        let mut base = *board;
        if base.drop_disc(col, player).is_err() {
            return false;
        }
        let winning_replies = base
            .open_columns()
            .filter(|&reply| {
                let mut trial = base;
                trial.drop_disc(reply, player).is_ok() && trial.check_win(player)
            })
            .count();
        winning_replies >= 2
    })
}

/// A move is a blunder when it lets the opponent win by stacking directly on top of it.
fn is_blunder(board: &Board, col: usize, bot: Player, opponent: Player) -> bool {
    let row = match board.landing_row(col) {
        Some(row) if row > 0 => row,
        _ => return false,
    };
    let mut trial = *board;
    trial.set(row, col, Some(bot));
    trial.set(row - 1, col, Some(opponent));
    trial.check_win(opponent)
}

/// Scores a column for the fallback step; `None` means the column is full.
fn evaluate_column(board: &Board, col: usize, bot: Player, opponent: Player) -> Option<i32> {
    let row = board.landing_row(col)?;
    let mut score = 0;

    if is_blunder(board, col, bot, opponent) {
        score += BLUNDER_PENALTY;
    }

    let mut trial = *board;
    trial.set(row, col, Some(bot));

    for (dr, dc) in DIRECTIONS {
        let run = 1
            + trial.count_direction(row, col, dr, dc, bot)
            + trial.count_direction(row, col, -dr, -dc, bot);
        score += match run {
            n if n >= 4 => RUN_FOUR_BONUS,
            3 => RUN_THREE_BONUS,
            2 => RUN_TWO_BONUS,
            _ => 0,
        };
    }

    let center = (COLS / 2) as i32;
    score += (center - (center - col as i32).abs()) * CENTER_WEIGHT;
    score += row as i32 * DEPTH_WEIGHT;
    score -= pressure_score(&trial, opponent);

    Some(score)
}

/// Rough measure of how many short runs `player` already owns.
fn pressure_score(board: &Board, player: Player) -> i32 {
    let mut score = 0;
    for row in 0..super::board::ROWS {
        for col in 0..COLS {
            if board.get(row, col) != Some(player) {
                continue;
            }
            for (dr, dc) in DIRECTIONS {
                let run = 1 + board.count_direction(row, col, dr, dc, player);
                if run >= 3 {
                    score += PRESSURE_THREE;
                } else if run == 2 {
                    score += PRESSURE_TWO;
                }
            }
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::ROWS;

    const BOT: Player = Player::Two;
    const HUMAN: Player = Player::One;

    fn place(board: &mut Board, cells: &[(usize, usize, Player)]) {
        for &(row, col, player) in cells {
            board.set(row, col, Some(player));
        }
    }

    #[test]
    fn test_empty_board_prefers_center() {
        assert_eq!(choose_column(&Board::new(), BOT, HUMAN), Some(3));
    }

    #[test]
    fn test_takes_instant_win() {
        let mut board = Board::new();
        place(&mut board, &[
            (5, 0, BOT), (5, 1, BOT), (5, 2, BOT),
            (4, 0, HUMAN), (4, 1, HUMAN), (5, 5, HUMAN),
        ]);
        assert_eq!(choose_column(&board, BOT, HUMAN), Some(3));
    }

    #[test]
    fn test_blocks_immediate_loss() {
        let mut board = Board::new();
        place(&mut board, &[
            (5, 1, HUMAN), (5, 2, HUMAN), (5, 3, HUMAN),
            (4, 1, BOT), (4, 2, BOT),
        ]);
        assert_eq!(choose_column(&board, BOT, HUMAN), Some(0));
    }

    #[test]
    fn test_win_beats_block() {
        let mut board = Board::new();
        place(&mut board, &[
            (5, 1, HUMAN), (5, 2, HUMAN), (5, 3, HUMAN),
            (5, 6, BOT), (4, 6, BOT), (3, 6, BOT),
        ]);
        assert_eq!(choose_column(&board, BOT, HUMAN), Some(6));
    }

    #[test]
    fn test_creates_fork() {
        let mut board = Board::new();
        place(&mut board, &[
            (5, 3, BOT), (5, 4, BOT),
            (5, 0, HUMAN), (4, 0, HUMAN),
        ]);
        assert_eq!(find_fork(&board, BOT), Some(2));
        assert_eq!(choose_column(&board, BOT, HUMAN), Some(2));
    }

    #[test]
    fn test_denies_opponent_fork() {
        let mut board = Board::new();
        place(&mut board, &[
            (5, 3, HUMAN), (5, 4, HUMAN),
            (5, 0, BOT), (4, 0, BOT),
        ]);
        assert_eq!(find_fork(&board, BOT), None);
        assert_eq!(choose_column(&board, BOT, HUMAN), Some(2));
    }

    #[test]
    fn test_blunder_detection() {
        let mut board = Board::new();
        place(&mut board, &[
            (5, 0, BOT), (5, 1, HUMAN), (5, 2, BOT),
            (4, 0, HUMAN), (4, 1, HUMAN), (4, 2, HUMAN),
        ]);
        assert!(is_blunder(&board, 3, BOT, HUMAN));
        assert!(!is_blunder(&board, 4, BOT, HUMAN));

        let blunder = evaluate_column(&board, 3, BOT, HUMAN).unwrap();
        let safe = evaluate_column(&board, 4, BOT, HUMAN).unwrap();
        assert!(blunder < safe);
    }

    #[test]
    fn test_full_column_is_never_scored() {
        let mut board = Board::new();
        for row in 0..ROWS {
            let player = if row % 2 == 0 { BOT } else { HUMAN };
            board.set(row, 3, Some(player));
        }
        assert_eq!(evaluate_column(&board, 3, BOT, HUMAN), None);
        assert_ne!(choose_column(&board, BOT, HUMAN), Some(3));
    }

    #[test]
    fn test_no_move_on_full_board() {
        let mut board = Board::new();
        for row in 0..ROWS {
            for col in 0..COLS {
                board.set(row, col, Some(if (row + col) % 2 == 0 { BOT } else { HUMAN }));
            }
        }
        assert_eq!(choose_column(&board, BOT, HUMAN), None);
    }

    #[test]
    fn test_pressure_counts_short_runs() {
        let mut board = Board::new();
        assert_eq!(pressure_score(&board, HUMAN), 0);
        place(&mut board, &[(5, 0, HUMAN), (5, 1, HUMAN)]);
        // (5,0) sees a run of two to the right; (5,1) sees only itself.
        assert_eq!(pressure_score(&board, HUMAN), PRESSURE_TWO);
    }
}
