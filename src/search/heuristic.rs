use crate::engine::{exponent_value, GameState};

/// Positional weights favoring the top-left corner, row-major.
const GRADIENT: [f64; 16] = [
    4.0, 3.0, 2.0, 1.0,
    3.0, 1.0, 1.5, 1.0,
    2.0, 1.5, 1.0, 0.5,
    1.0, 0.5, 0.25, 0.1,
];

/// Corner index with the cells of its row and column, walking outward.
const CORNER_LINES: [(usize, [usize; 4], [usize; 4]); 4] = [
    (0, [0, 1, 2, 3], [0, 4, 8, 12]),
    (3, [3, 2, 1, 0], [3, 7, 11, 15]),
    (12, [12, 13, 14, 15], [12, 8, 4, 0]),
    (15, [15, 14, 13, 12], [15, 11, 7, 3]),
];

const ANCHOR_MIX: f64 = 0.8;
const CHAIN_MIX: f64 = 0.2;

/// Bonus for holding the max tile in the top-left cell: `pct` of the bonus base,
/// with the base capped at `score_cap`. Only matters early in a game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningAnchor {
    pub score_cap: f64,
    pub pct: f64,
}

/// Weights for the static evaluator.
///
/// Every bonus is a percentage of `max(score, bonus_floor)`, so structure
/// scales with the score and still breaks ties before the first merge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalWeights {
    pub score_weight: f64,
    /// Applied to the corner score in [0, 1].
    pub corner_bonus_pct: f64,
    /// Per-empty-cell percentage for boards at least 75% full, at least 50% full, and emptier.
    pub empty_tile_tiers: [f64; 3],
    /// Applied to the positional gradient in [0, 1].
    pub gradient_bonus_pct: f64,
    /// The largest tier bonus applies, so the bonus never shrinks as the score grows.
    pub opening_anchor: [OpeningAnchor; 2],
    pub bonus_floor: f64,
}

impl Default for EvalWeights {
    fn default() -> Self {
        Self {
            score_weight: 1.0,
            corner_bonus_pct: 0.55,
            // 9 × 0.0165 > 8 × 0.018 and 5 × 0.018 > 4 × 0.02: opening a cell never lowers the bonus.
            empty_tile_tiers: [0.02, 0.018, 0.0165],
            gradient_bonus_pct: 0.12,
            opening_anchor: [
                OpeningAnchor { score_cap: 1000.0, pct: 0.03 },
                OpeningAnchor { score_cap: 2000.0, pct: 0.02 },
            ],
            bonus_floor: 64.0,
        }
    }
}

/// Static value of a non-terminal state at the search horizon. Pure.
///
/// ```
/// use ab_2048::engine::{Board, GameState};
/// use ab_2048::search::{evaluate, EvalWeights};
/// let w = EvalWeights::default();
/// let anchored = GameState::new(Board::from_cells(&[2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap());
/// let drifting = GameState::new(Board::from_cells(&[0, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap());
/// assert!(evaluate(&anchored, &w) > evaluate(&drifting, &w));
/// ```
pub fn evaluate(state: &GameState, weights: &EvalWeights) -> f64 {
    let cells = state.board().cells();
    let score = state.score() as f64;
    let base = score.max(weights.bonus_floor);

    let empty = cells.iter().filter(|&&e| e == 0).count();

    score * weights.score_weight
        + base * weights.corner_bonus_pct * corner_score(&cells)
        + base * empty_tier(weights, empty) * empty as f64
        + base * weights.gradient_bonus_pct * gradient_score(&cells)
        + opening_anchor_bonus(weights, base, &cells)
}

/// 0 unless the max tile sits in a corner; otherwise anchor plus outward chain, in [0, 1].
pub(crate) fn corner_score(cells: &[u8; 16]) -> f64 {
    let max = cells.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return 0.0;
    }
    CORNER_LINES
        .iter()
        .filter(|(corner, _, _)| cells[*corner] == max)
        .map(|(_, row, col)| {
            let chain = chain_len(cells, row).max(chain_len(cells, col));
            ANCHOR_MIX + CHAIN_MIX * chain as f64 / 4.0
        })
        .fold(0.0, f64::max)
}

// Length of the non-increasing run of nonzero tiles starting at path[0].
fn chain_len(cells: &[u8; 16], path: &[usize; 4]) -> usize {
    1 + path
        .windows(2)
        .take_while(|w| cells[w[1]] > 0 && cells[w[0]] >= cells[w[1]])
        .count()
}

fn empty_tier(weights: &EvalWeights, empty: usize) -> f64 {
    let filled = 16 - empty;
    if filled >= 12 {
        weights.empty_tile_tiers[0]
    } else if filled >= 8 {
        weights.empty_tile_tiers[1]
    } else {
        weights.empty_tile_tiers[2]
    }
}

/// Tile values dotted with [`GRADIENT`], normalized by the best possible layout of the max tile.
pub(crate) fn gradient_score(cells: &[u8; 16]) -> f64 {
    let max_tile = exponent_value(cells.iter().copied().max().unwrap_or(0)) as f64;
    if max_tile == 0.0 {
        return 0.0;
    }
    let weighted: f64 = cells
        .iter()
        .zip(GRADIENT.iter())
        .map(|(&e, &w)| exponent_value(e) as f64 * w)
        .sum();
    let ceiling = max_tile * GRADIENT.iter().sum::<f64>();
    (weighted / ceiling).min(1.0)
}

fn opening_anchor_bonus(weights: &EvalWeights, base: f64, cells: &[u8; 16]) -> f64 {
    let max = cells.iter().copied().max().unwrap_or(0);
    if max == 0 || cells[0] != max {
        return 0.0;
    }
    weights
        .opening_anchor
        .iter()
        .map(|tier| tier.pct * base.min(tier.score_cap))
        .fold(0.0, f64::max)
}
