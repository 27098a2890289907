use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ab_2048::engine::{self as GameEngine, Board, GameState, Move};
use ab_2048::search::{evaluate, ordered_successors, Agent, AlphaBeta, Deadline, Greedy, SearchConfig, SearchReport};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "runner", about = "Play and evaluate the 2048 alpha-beta agent")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AgentKind {
    Alphabeta,
    Greedy,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Play one game, printing the board after every move
    Play {
        /// Seconds per move
        #[arg(long, default_value_t = 0.1)]
        time: f64,
        #[arg(long)]
        max_depth: Option<u32>,
        /// RNG seed for tile spawns (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        verbose: bool,
    },
    /// Run a batch of games and summarize the results
    Eval {
        #[arg(long, default_value_t = 10)]
        games: u32,
        /// Seconds per move
        #[arg(long, default_value_t = 0.1)]
        time: f64,
        #[arg(long)]
        max_depth: Option<u32>,
        /// Base seed; game i uses seed + i
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, value_enum, default_value_t = AgentKind::Alphabeta)]
        agent: AgentKind,
        /// Print a line per game instead of a progress bar
        #[arg(long)]
        verbose: bool,
        /// Also write the summary as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Show the ordered moves and the chosen move for one position
    Analyze {
        /// 16 tile exponents, row-major, comma-separated (0 = empty, 1 = tile 2)
        #[arg(long, value_delimiter = ',', required = true)]
        cells: Vec<u8>,
        #[arg(long, default_value_t = 0)]
        score: u64,
        /// Seconds for the search
        #[arg(long, default_value_t = 1.0)]
        time: f64,
        #[arg(long)]
        max_depth: Option<u32>,
    },
}

#[derive(Debug)]
struct GameResult {
    score: u64,
    moves: u64,
    highest_tile: u64,
}

#[derive(Debug, Serialize)]
struct Summary {
    agent: String,
    games: u32,
    avg_score: f64,
    top_score: u64,
    avg_moves: f64,
    total_secs: f64,
    /// Highest tile reached -> number of games.
    max_tiles: BTreeMap<u64, u32>,
    report: Option<SearchReport>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    GameEngine::new();

    match args.cmd {
        Cmd::Play { time, max_depth, seed, verbose } => {
            let budget = move_budget(time)?;
            let mut agent = AlphaBeta::with_config(SearchConfig { max_depth, ..Default::default() });
            let mut rng = seeded(seed);
            let result = play_game(&mut agent, budget, &mut rng, |state, dir| {
                if verbose {
                    println!("Player moves {}\n{}", dir, state);
                }
            });
            println!("Score: {} | moves: {} | highest tile: {}", result.score, result.moves, result.highest_tile);
            println!("{}", agent.report());
        }
        Cmd::Eval { games, time, max_depth, seed, agent, verbose, json } => {
            let budget = move_budget(time)?;
            let summary = run_eval(agent, games, budget, max_depth, seed, verbose);
            print_summary(&summary);
            if let Some(path) = json {
                let text = serde_json::to_string_pretty(&summary).context("serializing summary")?;
                fs::write(&path, text).with_context(|| format!("writing summary to {}", path.display()))?;
                info!("Wrote summary to {}", path.display());
            }
        }
        Cmd::Analyze { cells, score, time, max_depth } => {
            let board = Board::from_cells(&cells).context("parsing --cells")?;
            let state = GameState::with_score(board, score);
            let budget = move_budget(time)?;
            analyze(&state, budget, max_depth);
        }
    }
    Ok(())
}

fn move_budget(secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("invalid --time {secs}"))
}

fn seeded(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn play_game<F>(agent: &mut dyn Agent, budget: Duration, rng: &mut StdRng, mut on_move: F) -> GameResult
where
    F: FnMut(&GameState, Move),
{
    let mut state = GameState::random_start(rng);
    let mut moves = 0u64;
    while let Some(dir) = agent.choose_move(&state, Deadline::after(budget)) {
        state = state.make_move(dir, rng);
        moves += 1;
        on_move(&state, dir);
    }
    GameResult { score: state.score(), moves, highest_tile: state.board().highest_tile() }
}

fn run_eval(
    kind: AgentKind,
    games: u32,
    budget: Duration,
    max_depth: Option<u32>,
    seed: Option<u64>,
    verbose: bool,
) -> Summary {
    let mut agent: Box<dyn Agent> = match kind {
        AgentKind::Alphabeta => Box::new(AlphaBeta::with_config(SearchConfig { max_depth, ..Default::default() })),
        AgentKind::Greedy => Box::new(Greedy),
    };
    let base_seed = seed.unwrap_or_else(rand::random);
    debug!("eval base seed {}", base_seed);

    let pb = if verbose {
        None
    } else {
        let pb = ProgressBar::new(u64::from(games));
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} games | {elapsed_precise} | {msg}") {
            pb.set_style(style);
        }
        Some(pb)
    };

    let start = Instant::now();
    let mut results = Vec::with_capacity(games as usize);
    for i in 0..games {
        let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(u64::from(i)));
        let result = play_game(agent.as_mut(), budget, &mut rng, |_, _| {});
        if verbose {
            info!(
                "game {}: score {} | moves {} | highest tile {}",
                i + 1,
                result.score,
                result.moves,
                result.highest_tile
            );
        }
        if let Some(pb) = &pb {
            pb.set_message(format!("last score {}", result.score));
            pb.inc(1);
        }
        results.push(result);
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let n = results.len().max(1) as f64;
    let mut max_tiles = BTreeMap::new();
    for r in &results {
        *max_tiles.entry(r.highest_tile).or_insert(0) += 1;
    }
    Summary {
        agent: format!("{:?}", kind).to_lowercase(),
        games,
        avg_score: results.iter().map(|r| r.score as f64).sum::<f64>() / n,
        top_score: results.iter().map(|r| r.score).max().unwrap_or(0),
        avg_moves: results.iter().map(|r| r.moves as f64).sum::<f64>() / n,
        total_secs: start.elapsed().as_secs_f64(),
        max_tiles,
        report: agent.report(),
    }
}

fn print_summary(summary: &Summary) {
    println!("Agent: {} over {} games", summary.agent, summary.games);
    println!("Average score: {:.1}", summary.avg_score);
    println!("Top score: {}", summary.top_score);
    println!("Average moves: {:.1}", summary.avg_moves);
    println!("Total time: {:.2}s", summary.total_secs);
    println!("Max tile distribution:");
    for line in max_tile_lines(&summary.max_tiles, summary.games) {
        println!("{}", line);
    }
    if let Some(report) = &summary.report {
        println!("{}", report);
    }
}

/// One line per highest tile, ascending, with its share of the games.
fn max_tile_lines(max_tiles: &BTreeMap<u64, u32>, games: u32) -> Vec<String> {
    let total = f64::from(games.max(1));
    max_tiles
        .iter()
        .map(|(tile, count)| format!("  {:>6}: {} ({:.1}%)", tile, count, f64::from(*count) * 100.0 / total))
        .collect()
}

fn analyze(state: &GameState, budget: Duration, max_depth: Option<u32>) {
    let mut agent = AlphaBeta::with_config(SearchConfig { max_depth, ..Default::default() });
    println!("{}", state);
    let successors = ordered_successors(state);
    if successors.is_empty() {
        println!("No legal moves: game over");
        return;
    }
    let weights = agent.config().weights;
    for (dir, next) in &successors {
        println!("  {:<5} score {:>7} | static value {:.2}", dir, next.score(), evaluate(next, &weights));
    }
    match agent.choose_move_within(state, budget) {
        Some(dir) => println!("Chosen: {}", dir),
        None => println!("No legal moves: game over"),
    }
    println!("{}", agent.report());
}
