//! ab-2048: a 2048 game engine + time-bounded alpha-beta policy
//!
//! This crate provides:
//! - A compact `Board` (tile exponents packed in a `u64`) and a `GameState`
//!   that tracks the merge score (`engine` module)
//! - An iterative-deepening alpha-beta agent with move ordering, a weighted
//!   static evaluator and search statistics (`search` module)
//!
//! Quick start:
//! ```
//! use std::time::Duration;
//! use ab_2048::engine::GameState;
//! use ab_2048::search::{AlphaBeta, SearchConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut state = GameState::random_start(&mut rng);
//! let mut agent = AlphaBeta::with_config(SearchConfig { max_depth: Some(2), ..Default::default() });
//!
//! let mut moves = 0u32;
//! while moves < 4 {
//!     match agent.choose_move_within(&state, Duration::from_millis(20)) {
//!         Some(dir) => state = state.make_move(dir, &mut rng),
//!         None => break,
//!     }
//!     moves += 1;
//! }
//! assert!(moves > 0);
//! let _report = agent.report();
//! ```
//!
//! The search never consults spawn probabilities: tile placements are
//! treated as an adversary picking the worst cell and value.
pub mod engine;
pub mod search;
