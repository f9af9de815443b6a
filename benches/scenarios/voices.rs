//! Benchmarks for polyphonic voice rendering.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::{voices, EngineConfig, GraphDescription, Note, RenderEngine, TimeUnit};

use crate::BLOCK_SIZES;

fn poly_engine(block_size: usize, num_voices: usize, notes: usize) -> RenderEngine {
    let config = EngineConfig::default()
        .with_sample_rate(48_000.0)
        .with_block_size(block_size);
    let mut engine = RenderEngine::new(config).unwrap();
    voices::register_builtins(engine.registry_mut());
    engine.make_poly("keys", voices::SINE, num_voices).unwrap();
    for i in 0..notes {
        let note = Note::new(48 + (i * 7 % 24) as u8, 100, i as f64 * 0.25, 0.5);
        engine.add_note("keys", note, TimeUnit::Beats).unwrap();
    }
    engine
        .load_graph(GraphDescription::new().node("keys", &[]))
        .unwrap();
    engine
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");
    group.sample_size(20);

    for &size in BLOCK_SIZES {
        // === SPARSE ===
        // one note at a time, most voices idle
        let mut engine = poly_engine(size, 8, 4);
        group.bench_with_input(BenchmarkId::new("sparse", size), &size, |b, _| {
            b.iter(|| engine.render(black_box(1.0), TimeUnit::Seconds).unwrap())
        });

        // === DENSE ===
        // overlapping notes, every voice sounding and stealing
        let mut engine = poly_engine(size, 16, 64);
        group.bench_with_input(BenchmarkId::new("dense", size), &size, |b, _| {
            b.iter(|| engine.render(black_box(1.0), TimeUnit::Seconds).unwrap())
        });
    }

    group.finish();
}
