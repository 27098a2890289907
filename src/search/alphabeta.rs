use std::time::Duration;

use log::{debug, trace};

use crate::engine::{self, GameState, Move};

use super::heuristic::evaluate;
use super::ordering::ordered_successors;
use super::{Agent, CommitPolicy, Deadline, SearchConfig, SearchReport, SearchStats};

/// The deadline passed while a node was being searched; its value is meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Aborted;

type Eval = Result<f64, Aborted>;

/// Per-move scratch shared by the recursion.
struct Ctx {
    deadline: Deadline,
    /// Node budget for the whole move selection, root nodes included.
    node_limit: Option<u64>,
    visited: u64,
    /// Set when any node was cut off by depth rather than by game over. Reset per iteration.
    horizon: bool,
}

impl Ctx {
    fn new(deadline: Deadline, node_limit: Option<u64>) -> Self {
        Ctx { deadline, node_limit, visited: 0, horizon: false }
    }

    #[inline]
    fn exhausted(&self) -> bool {
        self.node_limit.map_or(false, |limit| self.visited >= limit) || self.deadline.expired()
    }
}

struct Iteration {
    best: Option<(Move, f64)>,
    complete: bool,
    horizon: bool,
}

/// Iterative-deepening alpha-beta search.
///
/// Max plies pick the agent's move; chance plies assume the environment
/// places the worst tile for the agent. Statistics accumulate over the
/// lifetime of the instance.
pub struct AlphaBeta {
    cfg: SearchConfig,
    stats: SearchStats,
}

impl AlphaBeta {
    pub fn new() -> Self { Self::with_config(SearchConfig::default()) }

    pub fn with_config(cfg: SearchConfig) -> Self {
        engine::new();
        Self { cfg, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig { &self.cfg }

    /// Like [`Self::choose_move`] with a deadline `budget` from now.
    #[inline]
    pub fn choose_move_within(&mut self, state: &GameState, budget: Duration) -> Option<Move> {
        self.choose_move(state, Deadline::after(budget))
    }

    /// Search deeper and deeper until `deadline` (or the depth cap, or the node limit)
    /// and return the committed move.
    ///
    /// The move orderer's top pick is committed before depth 1 starts, so any
    /// state with a legal move yields `Some`, even with an expired deadline.
    /// Returns `None` only when there is no legal move.
    ///
    /// ```
    /// use ab_2048::engine::{Board, GameState};
    /// use ab_2048::search::{AlphaBeta, Deadline, SearchConfig};
    /// let s = GameState::new(Board::from_cells(&[2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap());
    /// let mut ab = AlphaBeta::with_config(SearchConfig { max_depth: Some(2), ..Default::default() });
    /// let m = ab.choose_move(&s, Deadline::unbounded()).unwrap();
    /// assert!(s.legal_actions().contains(&m));
    /// ```
    pub fn choose_move(&mut self, state: &GameState, deadline: Deadline) -> Option<Move> {
        let (fallback, _) = *ordered_successors(state).first()?;
        self.stats.searches += 1;

        let mut ctx = Ctx::new(deadline, self.cfg.node_limit);
        let mut committed = fallback;
        let mut depth = 1;
        while !ctx.exhausted() && self.cfg.max_depth.map_or(true, |cap| depth <= cap) {
            let iteration = self.search_root(state, depth, &mut ctx);
            if iteration.complete {
                self.stats.depth_iterations += 1;
            }
            let may_commit = iteration.complete || self.cfg.commit_policy == CommitPolicy::EvaluatedActions;
            match iteration.best {
                Some((dir, value)) if may_commit => {
                    committed = dir;
                    debug!(
                        "depth {} committed {} (value {:.1}, complete {}, nodes {})",
                        depth, dir, value, iteration.complete, self.stats.nodes
                    );
                }
                _ => trace!("depth {} aborted, keeping {}", depth, committed),
            }
            if !iteration.complete || !iteration.horizon {
                // Out of time or nodes, or every line ended in game over: deeper search changes nothing.
                break;
            }
            depth += 1;
        }
        Some(committed)
    }

    /// Fixed-depth value of `state` as a max node with a full window.
    ///
    /// Runs without a deadline or node limit, so the result is always `Some`.
    /// Depth counts plies: depth 2 is one agent move plus one tile placement.
    pub fn evaluate_root(&mut self, state: &GameState, depth: u32) -> Option<f64> {
        let mut ctx = Ctx::new(Deadline::unbounded(), None);
        self.max_value(*state, depth, f64::NEG_INFINITY, f64::INFINITY, &mut ctx).ok()
    }

    /// Lifetime counters.
    #[inline]
    pub fn stats(&self) -> SearchStats { self.stats }

    #[inline]
    pub fn report(&self) -> SearchReport { self.stats.report() }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn search_root(&mut self, state: &GameState, depth: u32, ctx: &mut Ctx) -> Iteration {
        ctx.horizon = false;
        ctx.visited += 1;
        self.stats.nodes += 1;
        self.stats.parents += 1;

        let mut alpha = f64::NEG_INFINITY;
        let mut best: Option<(Move, f64)> = None;
        let mut complete = true;
        for (dir, next) in ordered_successors(state) {
            match self.chance_value(next, depth - 1, alpha, f64::INFINITY, ctx) {
                Ok(value) => {
                    if best.map_or(true, |(_, b)| value > b) {
                        best = Some((dir, value));
                    }
                    alpha = alpha.max(value);
                }
                Err(Aborted) => {
                    complete = false;
                    break;
                }
            }
        }
        Iteration { best, complete, horizon: ctx.horizon }
    }

    fn max_value(&mut self, state: GameState, depth: u32, mut alpha: f64, beta: f64, ctx: &mut Ctx) -> Eval {
        if ctx.exhausted() {
            return Err(Aborted);
        }
        ctx.visited += 1;
        self.stats.nodes += 1;
        self.stats.children += 1;

        if depth == 0 {
            return Ok(self.leaf_value(&state, ctx));
        }
        // No successors is the game-over check.
        let successors = ordered_successors(&state);
        if successors.is_empty() {
            return Ok(state.score() as f64);
        }

        self.stats.parents += 1;
        let mut best = f64::NEG_INFINITY;
        for (_, next) in successors {
            let value = self.chance_value(next, depth - 1, alpha, beta, ctx)?;
            best = best.max(value);
            alpha = alpha.max(best);
            if self.cfg.pruning && alpha >= beta {
                self.stats.pruned += 1;
                break;
            }
        }
        Ok(best)
    }

    // Chance states follow a legal move, so they always have an empty cell.
    fn chance_value(&mut self, state: GameState, depth: u32, alpha: f64, mut beta: f64, ctx: &mut Ctx) -> Eval {
        if ctx.exhausted() {
            return Err(Aborted);
        }
        ctx.visited += 1;
        self.stats.nodes += 1;
        self.stats.children += 1;

        if depth == 0 {
            return Ok(self.leaf_value(&state, ctx));
        }

        let mut placements = state.tile_placements().peekable();
        if placements.peek().is_none() {
            return Ok(state.score() as f64);
        }

        self.stats.parents += 1;
        let mut best = f64::INFINITY;
        for next in placements {
            let value = self.max_value(next, depth - 1, alpha, beta, ctx)?;
            best = best.min(value);
            beta = beta.min(best);
            if self.cfg.pruning && alpha >= beta {
                self.stats.pruned += 1;
                break;
            }
        }
        Ok(best)
    }

    // Game over beats the horizon: a finished game is worth its score.
    fn leaf_value(&self, state: &GameState, ctx: &mut Ctx) -> f64 {
        if state.is_terminal() {
            state.score() as f64
        } else {
            ctx.horizon = true;
            evaluate(state, &self.cfg.weights)
        }
    }
}

impl Default for AlphaBeta { fn default() -> Self { Self::new() } }

impl Agent for AlphaBeta {
    fn choose_move(&mut self, state: &GameState, deadline: Deadline) -> Option<Move> {
        AlphaBeta::choose_move(self, state, deadline)
    }

    fn report(&self) -> Option<SearchReport> { Some(self.stats.report()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Board;
    use crate::search::order_moves;
    use std::time::Instant;

    fn state(cells: [u8; 16], score: u64) -> GameState {
        GameState::with_score(Board::from_cells(&cells).unwrap(), score)
    }

    fn capped(depth: u32) -> AlphaBeta {
        AlphaBeta::with_config(SearchConfig { max_depth: Some(depth), ..Default::default() })
    }

    // Independent full-tree count of (parents, children) below a node.
    fn count_tree(state: GameState, depth: u32, max_turn: bool) -> (u64, u64) {
        if depth == 0 || state.is_terminal() {
            return (0, 0);
        }
        let kids: Vec<GameState> = if max_turn {
            state.legal_actions().into_iter().map(|m| state.apply_move(m)).collect()
        } else {
            state.tile_placements().collect()
        };
        kids.into_iter().fold((1, 0), |(p, c), kid| {
            let (kp, kc) = count_tree(kid, depth - 1, !max_turn);
            (p + kp, c + 1 + kc)
        })
    }

    #[test]
    fn no_legal_move_returns_none_without_searching() {
        let mut ab = AlphaBeta::new();
        let s = state([1, 2, 1, 2, 2, 1, 2, 1, 1, 2, 1, 2, 2, 1, 2, 1], 300);
        assert_eq!(ab.choose_move(&s, Deadline::unbounded()), None);
        assert_eq!(ab.stats(), SearchStats::default());
    }

    #[test]
    fn expired_deadline_falls_back_to_ordering() {
        let mut ab = AlphaBeta::new();
        let s = state([1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 8);
        let m = ab.choose_move(&s, Deadline::at(Instant::now()));
        assert_eq!(m, Some(Move::Up));
        assert_eq!(ab.stats().depth_iterations, 0);
        assert_eq!(ab.stats().searches, 1);
    }

    #[test]
    fn depth_one_counts_root_children() {
        let mut ab = capped(1);
        let s = state([1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 8);
        ab.choose_move(&s, Deadline::unbounded());
        let st = ab.stats();
        assert_eq!(st.parents, 1);
        assert_eq!(st.children, 3);
        assert_eq!(st.nodes, 4);
        assert_eq!(st.depth_iterations, 1);
        assert_eq!(st.branching_factor(), 3.0);
    }

    #[test]
    fn unpruned_counts_match_full_tree() {
        // Full board with a single horizontal pair: Left and Right are legal.
        let s = state([1, 1, 2, 3, 2, 3, 4, 5, 3, 4, 5, 6, 4, 5, 6, 7], 0);
        assert_eq!(s.legal_actions(), vec![Move::Left, Move::Right]);
        let depth = 3;
        let mut ab = AlphaBeta::with_config(SearchConfig { pruning: false, ..Default::default() });
        ab.evaluate_root(&s, depth).unwrap();
        let (parents, children) = count_tree(s, depth, true);
        let st = ab.stats();
        // evaluate_root counts the root itself as a child call.
        assert_eq!(st.parents, parents);
        assert_eq!(st.children, children + 1);
        assert_eq!(st.pruned, 0);
        assert_eq!(st.branching_factor(), (children + 1) as f64 / parents as f64);
    }

    #[test]
    fn pruning_preserves_value() {
        let boards = [
            state([1, 1, 2, 3, 2, 3, 4, 5, 3, 4, 5, 6, 4, 5, 6, 7], 120),
            state([3, 2, 1, 1, 4, 0, 2, 3, 5, 6, 1, 2, 7, 5, 3, 0], 900),
            state([2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0),
            state([6, 5, 4, 3, 1, 2, 3, 0, 0, 1, 0, 0, 0, 0, 0, 1], 2400),
        ];
        for s in boards {
            for depth in 1..=4 {
                let mut pruned = AlphaBeta::new();
                let mut full = AlphaBeta::with_config(SearchConfig { pruning: false, ..Default::default() });
                let a = pruned.evaluate_root(&s, depth).unwrap();
                let b = full.evaluate_root(&s, depth).unwrap();
                assert_eq!(a, b, "depth {depth} board {:?}", s.board());
                assert!(pruned.stats().nodes <= full.stats().nodes);
            }
        }
    }

    #[test]
    fn chance_plies_take_the_worst_placement() {
        // One empty cell: the value of Left at depth 2 is the min over the 2 and the 4.
        let s = state([1, 1, 2, 3, 2, 3, 4, 5, 3, 4, 5, 6, 4, 5, 6, 7], 0);
        let mut ab = AlphaBeta::new();
        let after = s.apply_move(Move::Left);
        let worst = after
            .tile_placements()
            .map(|p| ab.evaluate_root(&p, 0).unwrap())
            .fold(f64::INFINITY, f64::min);
        let mut root = AlphaBeta::new();
        let chance = {
            let mut ctx = Ctx::new(Deadline::unbounded(), None);
            root.chance_value(after, 1, f64::NEG_INFINITY, f64::INFINITY, &mut ctx).unwrap()
        };
        assert_eq!(chance, worst);
    }

    #[test]
    fn game_over_leaf_scores_without_evaluator() {
        let s = state([1, 2, 1, 2, 2, 1, 2, 1, 1, 2, 1, 2, 2, 1, 2, 1], 300);
        let mut ab = AlphaBeta::new();
        assert_eq!(ab.evaluate_root(&s, 0), Some(300.0));
        assert_eq!(ab.evaluate_root(&s, 3), Some(300.0));
        assert_eq!(ab.stats().parents, 0);
    }

    #[test]
    fn completed_depth_policy_and_stats_accumulate() {
        let s = state([2, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 4);
        let mut ab = AlphaBeta::with_config(SearchConfig {
            max_depth: Some(3),
            commit_policy: CommitPolicy::CompletedDepth,
            ..Default::default()
        });
        let first = ab.choose_move(&s, Deadline::unbounded()).unwrap();
        let second = ab.choose_move(&s, Deadline::unbounded()).unwrap();
        assert_eq!(first, second);
        let st = ab.stats();
        assert_eq!(st.searches, 2);
        assert_eq!(st.depth_iterations, 6);
        assert_eq!(st.avg_depth(), 3.0);
        ab.reset_stats();
        assert_eq!(ab.stats(), SearchStats::default());
    }

    // A lone 8 in row 1: all four moves tie in the orderer (Up first), but the
    // evaluator prefers Left, which lands on the heaviest gradient cell.
    // Depth 1 costs 5 nodes; at depth 2 the root is node 6 and Up's subtree
    // (one chance node over 30 placements) ends at node 37.
    const LONE_TILE: [u8; 16] = [0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0];

    fn node_limited(limit: u64, commit_policy: CommitPolicy) -> AlphaBeta {
        AlphaBeta::with_config(SearchConfig { node_limit: Some(limit), commit_policy, ..Default::default() })
    }

    #[test]
    fn depth_one_prefers_the_heaviest_gradient_cell() {
        let s = state(LONE_TILE, 0);
        assert_eq!(order_moves(&s), Move::ALL.to_vec());
        let mut ab = capped(1);
        assert_eq!(ab.choose_move(&s, Deadline::unbounded()), Some(Move::Left));
        assert_eq!(ab.stats().nodes, 5);
    }

    #[test]
    fn completed_depth_ignores_an_interrupted_iteration() {
        // Node 38 is Down's chance node; its first placement aborts depth 2.
        let s = state(LONE_TILE, 0);
        let mut ab = node_limited(38, CommitPolicy::CompletedDepth);
        assert_eq!(ab.choose_move(&s, Deadline::unbounded()), Some(Move::Left));
        assert_eq!(ab.stats().depth_iterations, 1);
        assert_eq!(ab.stats().nodes, 38);
    }

    #[test]
    fn evaluated_actions_commit_the_finished_root_action() {
        let s = state(LONE_TILE, 0);
        let mut ab = node_limited(38, CommitPolicy::EvaluatedActions);
        // Up finished at depth 2 and replaces Left; the aborted Down is discarded.
        assert_eq!(ab.choose_move(&s, Deadline::unbounded()), Some(Move::Up));
        assert_eq!(ab.stats().depth_iterations, 1);
    }

    #[test]
    fn iteration_aborted_before_any_action_keeps_the_previous_move() {
        // Depth 2 aborts inside Up's chance node, after three placements.
        let s = state(LONE_TILE, 0);
        for policy in [CommitPolicy::EvaluatedActions, CommitPolicy::CompletedDepth] {
            let mut ab = node_limited(10, policy);
            assert_eq!(ab.choose_move(&s, Deadline::unbounded()), Some(Move::Left));
            assert_eq!(ab.stats().depth_iterations, 1);
            assert_eq!(ab.stats().nodes, 10);
        }
    }

    #[test]
    fn node_limit_applies_per_move() {
        let s = state(LONE_TILE, 0);
        let mut ab = node_limited(10, CommitPolicy::default());
        ab.choose_move(&s, Deadline::unbounded());
        ab.choose_move(&s, Deadline::unbounded());
        assert_eq!(ab.stats().nodes, 20);
        assert_eq!(ab.stats().searches, 2);
    }

    #[test]
    fn chance_node_expands_every_placement_after_a_move() {
        // Left merges the pair and frees exactly one cell; the chance node always has children.
        let s = state([1, 1, 2, 3, 2, 3, 4, 5, 3, 4, 5, 6, 4, 5, 6, 7], 0);
        let after = s.apply_move(Move::Left);
        assert_eq!(after.board().count_empty(), 1);
        let mut ab = AlphaBeta::with_config(SearchConfig { pruning: false, ..Default::default() });
        let mut ctx = Ctx::new(Deadline::unbounded(), None);
        ab.chance_value(after, 1, f64::NEG_INFINITY, f64::INFINITY, &mut ctx).unwrap();
        assert_eq!(ab.stats().parents, 1);
        assert_eq!(ab.stats().children, 3);
        assert_eq!(ctx.visited, 3);
    }

    #[test]
    fn resolved_endgame_stops_deepening() {
        // Left/Right merge the only pair; every placement afterwards ends the game.
        let s = state([2, 2, 4, 5, 4, 5, 6, 7, 5, 6, 7, 8, 6, 7, 8, 9], 0);
        assert_eq!(s.legal_actions(), vec![Move::Left, Move::Right]);
        let mut ab = AlphaBeta::new();
        let m = ab.choose_move(&s, Deadline::unbounded());
        // Both are worth the same 8 points; the tie keeps ordering's first pick.
        assert_eq!(m, Some(Move::Left));
        assert_eq!(ab.stats().depth_iterations, 2);
    }
}
