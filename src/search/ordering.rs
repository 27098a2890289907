use std::cmp::Reverse;

use crate::engine::{Board, GameState, Move};

const MIN_EMPTY_TILE_WEIGHT: u64 = 16;

/// Legal moves paired with their successor states, best-looking first.
///
/// Each move is ranked by `successor score + empty cells × max(16, highest tile / 8)`.
/// Ties keep enumeration order (Up, Down, Left, Right); moves that leave the
/// board unchanged are dropped.
pub fn ordered_successors(state: &GameState) -> Vec<(Move, GameState)> {
    let weight = empty_tile_weight(state.board());
    let mut scored: Vec<(Move, GameState, u64)> = Move::ALL
        .iter()
        .filter_map(|&dir| {
            let next = state.apply_move(dir);
            if next.board() == state.board() {
                return None;
            }
            let rank = next.score() + u64::from(next.board().count_empty()) * weight;
            Some((dir, next, rank))
        })
        .collect();
    // sort_by_key is stable
    scored.sort_by_key(|&(_, _, rank)| Reverse(rank));
    scored.into_iter().map(|(dir, next, _)| (dir, next)).collect()
}

/// Legal moves, best-looking first. See [`ordered_successors`].
///
/// ```
/// use ab_2048::engine::{Board, GameState, Move};
/// use ab_2048::search::order_moves;
/// let s = GameState::new(Board::from_cells(&[1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap());
/// // Merging scores and opens a cell; Left comes before Right on the tie.
/// assert_eq!(order_moves(&s), vec![Move::Left, Move::Right, Move::Down]);
/// ```
pub fn order_moves(state: &GameState) -> Vec<Move> {
    ordered_successors(state).into_iter().map(|(dir, _)| dir).collect()
}

fn empty_tile_weight(board: Board) -> u64 {
    (board.highest_tile() / 8).max(MIN_EMPTY_TILE_WEIGHT)
}
