use std::time::Duration;

use ab_2048::engine::{self as GameEngine, GameState};
use ab_2048::search::AlphaBeta;
use log::info;

const MOVE_BUDGET: Duration = Duration::from_millis(100);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    GameEngine::new();
    let mut agent = AlphaBeta::new();
    let mut rng = rand::thread_rng();
    let mut state = GameState::random_start(&mut rng);
    println!("{}", state);
    let mut move_count = 0;
    while let Some(direction) = agent.choose_move_within(&state, MOVE_BUDGET) {
        move_count += 1;
        state = state.make_move(direction, &mut rng);
        println!("Player moves {}\n{}", direction, state);
    }
    info!(
        "Game over after {} moves: score {}, highest tile {}",
        move_count,
        state.score(),
        state.board().highest_tile()
    );
    println!("{}", agent.report());
}
