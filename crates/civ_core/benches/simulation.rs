//! Simulation benchmarks for civ_core.
//!
//! Run with: `cargo bench -p civ_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use civ_core::engine::GameEngine;
use civ_test_utils::fixtures::busy_classic_engine;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Tick throughput and offline catch-up on the classic content.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("classic_tick", |b| {
        let mut engine = busy_classic_engine();
        b.iter(|| black_box(engine.tick()))
    });

    c.bench_function("classic_catch_up_1h", |b| {
        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        b.iter_batched(
            busy_classic_engine,
            |mut engine: GameEngine| {
                black_box(engine.catch_up(since, now, Duration::from_secs(1), None))
            },
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("classic_snapshot", |b| {
        let engine = busy_classic_engine();
        b.iter(|| black_box(engine.snapshot()))
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
