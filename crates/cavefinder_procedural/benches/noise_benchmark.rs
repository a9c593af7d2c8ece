//! Benchmark for reference noise cost.
//!
//! Run with: cargo bench --package cavefinder_procedural --bench noise_benchmark

use cavefinder_core::{Channel, NoiseSampleProvider};
use cavefinder_procedural::{DoubleNoise, NoiseChannels, NoiseKey, SeedNoises, WorldSeed};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn benchmark_single_sample(c: &mut Criterion) {
    let noise = DoubleNoise::new(WorldSeed::new(42), NoiseKey::CaveCheese.params());

    c.bench_function("cheese_layer_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.sample(black_box(x), black_box(-20.0), black_box(x * 0.7)))
        });
    });
}

fn benchmark_layer_construction(c: &mut Criterion) {
    c.bench_function("seed_layers_cold_ridge", |b| {
        let mut seed = 0i64;
        b.iter(|| {
            seed += 1;
            let noises = SeedNoises::new(seed);
            black_box(noises.channel(Channel::Ridge, 30.0, 0.0, -85.0))
        });
    });
}

fn benchmark_cave_channels(c: &mut Criterion) {
    let channels = NoiseChannels::new();

    let mut group = c.benchmark_group("cave_channels");
    group.throughput(Throughput::Elements(10));
    group.bench_function("entrance_b_and_cheese_column", |b| {
        b.iter(|| {
            for y in (-50..=40).step_by(10) {
                let y = f64::from(y);
                black_box(channels.sample(7, Channel::EntranceB, 120.0, y, -340.0));
                black_box(channels.sample(7, Channel::Cheese, 120.0, y, -340.0));
            }
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_single_sample,
    benchmark_layer_construction,
    benchmark_cave_channels
);
criterion_main!(benches);
