//! Criterion benchmarks for the mind and the arena.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use stynker::agent::Agent;
use stynker::arena::{Arena, ArenaDefinition};
use stynker::config::{AgentConfig, MindConfig};
use stynker::geometry::Vec2;
use stynker::mind::{Mind, Phase};

fn make_mind(node_count: usize, seed: u64) -> Mind {
    let io = node_count / 4;
    Mind::new(MindConfig::with_size(node_count, io * 2, io).with_seed(seed))
        .expect("bench config is valid")
}

/// Dream cycles over growing graphs.
fn bench_dream_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("dream_size");

    for size in [48, 128, 512, 2048].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("propagate", size), size, |b, &size| {
            let mut mind = make_mind(size, 42);
            b.iter(|| black_box(mind.run_cycle(Phase::Dream).map(|ev| ev.spilled.len())));
        });
    }

    group.finish();
}

/// Sleep cycles: remodel selection plus edge rebuilding.
fn bench_sleep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sleep");

    group.bench_function("remodel_48", |b| {
        let mut mind = make_mind(48, 7);
        b.iter(|| {
            mind.run_cycle(Phase::Dream).ok();
            black_box(mind.run_cycle(Phase::Sleep).map(|ev| ev.remade.len()))
        });
    });

    group.finish();
}

/// Displacement resolution with many bounces in a hexagon.
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena");
    let arena = Arena::new(&ArenaDefinition::hexagon(360.0)).expect("preset is valid");

    for speed in [10.0f32, 1_000.0, 4_000.0].iter() {
        group.bench_with_input(BenchmarkId::new("resolve", speed), speed, |b, &speed| {
            let v = Vec2::new(speed * 0.8, speed * 0.6);
            b.iter(|| {
                black_box(arena.resolve_displacement(Vec2::ZERO, v, None).map(|r| r.bounces))
            });
        });
    }

    group.finish();
}

/// Full wake ticks of the default agent in the maze.
fn bench_agent_wake(c: &mut Criterion) {
    c.bench_function("agent_wake_default", |b| {
        let mut agent = Agent::new(&AgentConfig::default()).expect("default config is valid");
        b.iter(|| black_box(agent.run_cycle(Phase::Wake).map(|ev| ev.position)));
    });
}

criterion_group!(benches, bench_dream_sizes, bench_sleep, bench_resolve, bench_agent_wake);
criterion_main!(benches);
