//! Time-bounded alpha-beta search policy for 2048.
//!
//! This module provides:
//! - [`AlphaBeta`]: iterative-deepening alpha-beta over alternating Max
//!   (agent move) and Chance (tile placement) plies.
//! - [`Greedy`]: plays the move orderer's top pick, useful as a baseline.
//!
//! Chance plies are resolved adversarially: the environment is assumed to
//! place the worst possible tile for the agent. Spawn probabilities are not
//! consulted anywhere in the search.
//!
//! Quick start
//! ```
//! use std::time::Duration;
//! use ab_2048::engine::GameState;
//! use ab_2048::search::{AlphaBeta, SearchConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let state = GameState::random_start(&mut rng);
//!
//! let cfg = SearchConfig { max_depth: Some(3), ..Default::default() };
//! let mut ab = AlphaBeta::with_config(cfg);
//! let m = ab.choose_move_within(&state, Duration::from_millis(50));
//! assert!(m.is_some());
//! println!("{}", ab.report());
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::engine::{GameState, Move};

mod alphabeta;
mod heuristic;
mod ordering;

pub use alphabeta::AlphaBeta;
pub use heuristic::{evaluate, EvalWeights, OpeningAnchor};
pub use ordering::{order_moves, ordered_successors};

/// A move-selection policy driven once per turn by the harness.
pub trait Agent {
    /// Pick a move for `state` before `deadline`.
    ///
    /// Returns `None` when the state has no legal move (end of game).
    fn choose_move(&mut self, state: &GameState, deadline: Deadline) -> Option<Move>;

    /// Lifetime search statistics, for agents that collect them.
    fn report(&self) -> Option<SearchReport> { None }
}

/// Wall-clock instant after which a search must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Expires `budget` from now.
    pub fn after(budget: Duration) -> Self { Deadline(Instant::now().checked_add(budget)) }

    pub fn at(instant: Instant) -> Self { Deadline(Some(instant)) }

    /// Never expires.
    pub fn unbounded() -> Self { Deadline(None) }

    #[inline]
    pub fn expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

/// When a depth iteration may replace the committed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Commit the best of the root actions that finished before the deadline,
    /// even if the iteration was cut short.
    #[default]
    EvaluatedActions,
    /// Commit only iterations in which every root action finished.
    CompletedDepth,
}

/// Configurable knobs for [`AlphaBeta`].
///
/// - `max_depth`: optional hard cap on the iterative-deepening depth (None = until the deadline).
/// - `node_limit`: optional node budget per move selection; hitting it aborts like the deadline.
/// - `commit_policy`: whether interrupted iterations may update the chosen move.
/// - `pruning`: alpha-beta cutoffs; switching them off visits the full min/max tree.
/// - `weights`: static evaluator weights.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub max_depth: Option<u32>,
    pub node_limit: Option<u64>,
    pub commit_policy: CommitPolicy,
    pub pruning: bool,
    pub weights: EvalWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            node_limit: None,
            commit_policy: CommitPolicy::default(),
            pruning: true,
            weights: EvalWeights::default(),
        }
    }
}

/// Counters accumulated over the lifetime of a search agent.
///
/// `children / parents` is the average branching factor and
/// `depth_iterations / searches` the average completed depth per move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Every node entered, root included.
    pub nodes: u64,
    /// Nodes that expanded at least one child.
    pub parents: u64,
    /// Recursive child calls.
    pub children: u64,
    /// Alpha-beta cutoffs.
    pub pruned: u64,
    /// Depth iterations that evaluated every root action.
    pub depth_iterations: u64,
    /// Move selections on states with a legal move.
    pub searches: u64,
}

impl SearchStats {
    pub fn branching_factor(&self) -> f64 {
        if self.parents == 0 { 0.0 } else { self.children as f64 / self.parents as f64 }
    }

    pub fn avg_depth(&self) -> f64 {
        if self.searches == 0 { 0.0 } else { self.depth_iterations as f64 / self.searches as f64 }
    }

    pub fn report(&self) -> SearchReport {
        SearchReport {
            avg_depth: self.avg_depth(),
            branching_factor: self.branching_factor(),
            pruned: self.pruned,
            nodes: self.nodes,
            searches: self.searches,
        }
    }
}

/// Summary of [`SearchStats`] for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchReport {
    pub avg_depth: f64,
    pub branching_factor: f64,
    pub pruned: u64,
    pub nodes: u64,
    pub searches: u64,
}

impl fmt::Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Average depth: {:.2}", self.avg_depth)?;
        writeln!(f, "Branching factor: {:.2}", self.branching_factor)?;
        writeln!(f, "Pruned nodes: {}", self.pruned)?;
        write!(f, "Nodes: {} over {} moves", self.nodes, self.searches)
    }
}

/// Plays the highest-ranked move from the move orderer, without search.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl Agent for Greedy {
    fn choose_move(&mut self, state: &GameState, _deadline: Deadline) -> Option<Move> {
        order_moves(state).first().copied()
    }
}
