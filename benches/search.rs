use ab_2048::engine::{self as GameEngine, GameState, Move};
use ab_2048::search::{evaluate, order_moves, AlphaBeta, EvalWeights, SearchConfig};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<GameState> {
    let mut rng = StdRng::seed_from_u64(1337);
    let mut states = Vec::new();
    let mut s = GameState::random_start(&mut rng);
    states.push(s);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Up];
    for i in 0..48 {
        let dir = seq[i % seq.len()];
        let next = s.apply_move(dir);
        if next.board() != s.board() {
            s = next.with_random_tile(&mut rng);
        }
        if i % 4 == 3 {
            states.push(s);
        }
    }
    states
}

fn bench_evaluate(c: &mut Criterion) {
    GameEngine::new();
    let states = corpus();
    let weights = EvalWeights::default();
    c.bench_function("heuristic/evaluate", |b| {
        b.iter(|| {
            let mut acc = 0f64;
            for s in &states {
                acc += evaluate(black_box(s), &weights);
            }
            black_box(acc)
        })
    });
}

fn bench_order(c: &mut Criterion) {
    GameEngine::new();
    let states = corpus();
    c.bench_function("ordering/order_moves", |b| {
        b.iter(|| {
            let mut n = 0usize;
            for s in &states {
                n += order_moves(black_box(s)).len();
            }
            black_box(n)
        })
    });
}

fn bench_fixed_depth(c: &mut Criterion) {
    GameEngine::new();
    let states = corpus();
    let mut group = c.benchmark_group("alphabeta/evaluate_root");
    for depth in [2u32, 4] {
        for pruning in [true, false] {
            let id = BenchmarkId::new(if pruning { "pruned" } else { "full" }, depth);
            group.bench_with_input(id, &depth, |b, &depth| {
                let mut ab = AlphaBeta::with_config(SearchConfig { pruning, ..Default::default() });
                b.iter(|| {
                    for s in states.iter().take(4) {
                        black_box(ab.evaluate_root(s, depth));
                    }
                })
            });
        }
    }
    group.finish();
}

criterion_group!(search, bench_evaluate, bench_order, bench_fixed_depth);
criterion_main!(search);
