//! Benchmark for predicate evaluation overhead.
//!
//! Uses a trivial hash-based sampler so the numbers reflect the engine's
//! branching, not noise cost.
//!
//! Run with: cargo bench --package cavefinder_core --bench predicate_benchmark

use cavefinder_core::{
    Channel, Coordinate, DepthFloor, FilterMode, ParameterSet, PredicateEngine, ProgressTracker,
    SeedKind,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Maps (seed, channel, point) to [-1, 1) with a cheap mix.
fn hashed(seed: i64, channel: Channel, x: f64, y: f64, z: f64) -> f64 {
    let mut h = seed as u64 ^ (channel as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= x.to_bits().rotate_left(17) ^ y.to_bits().rotate_left(31) ^ z.to_bits();
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 31;
    (h >> 11) as f64 / (1u64 << 52) as f64 - 1.0
}

fn engine(mode: FilterMode) -> PredicateEngine {
    PredicateEngine::new(
        Arc::new(hashed),
        Coordinate::new(120, -340),
        ParameterSet::default(),
        DepthFloor::default(),
        mode,
    )
}

fn benchmark_normal_mode(c: &mut Criterion) {
    let engine = engine(FilterMode::default());
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let seeds: Vec<i64> = (0..10_000).map(|_| rng.gen()).collect();

    let mut group = c.benchmark_group("predicate");
    group.throughput(Throughput::Elements(seeds.len() as u64));
    group.bench_function("normal_10k_seeds", |b| {
        b.iter(|| seeds.iter().filter(|&&s| engine.evaluate(black_box(s))).count());
    });
    group.finish();
}

fn benchmark_bedrock_mode(c: &mut Criterion) {
    let engine = engine(FilterMode::BedrockImpossible);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let seeds: Vec<i64> = (0..10_000).map(|_| rng.gen()).collect();

    let mut group = c.benchmark_group("predicate");
    group.throughput(Throughput::Elements(seeds.len() as u64));
    group.bench_function("bedrock_10k_seeds", |b| {
        b.iter(|| seeds.iter().filter(|&&s| engine.evaluate(black_box(s))).count());
    });
    group.finish();
}

fn benchmark_progress_report(c: &mut Criterion) {
    let tracker = ProgressTracker::new(SeedKind::Full, None);
    c.bench_function("progress_report_throttled", |b| {
        b.iter(|| black_box(tracker.report(black_box(1))));
    });
}

criterion_group!(
    benches,
    benchmark_normal_mode,
    benchmark_bedrock_mode,
    benchmark_progress_report
);
criterion_main!(benches);
