//! Benchmarks for warped playback.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use saavy_render::{EngineConfig, GraphDescription, RenderEngine, SourceBuffer, TimeUnit};

use crate::BLOCK_SIZES;

fn warp_engine(block_size: usize, transpose: f32) -> RenderEngine {
    let config = EngineConfig::default()
        .with_sample_rate(48_000.0)
        .with_block_size(block_size);
    let mut engine = RenderEngine::new(config).unwrap();

    let frames: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.03).sin()).collect();
    let source = Arc::new(SourceBuffer::new(vec![frames.clone(), frames], 44_100.0).unwrap());
    let warp = engine.make_warp("loop", source).unwrap();
    warp.set_markers_from_bpm(96.0).unwrap();
    warp.set_loop(0.0, 22_050.0).unwrap();
    engine.set_parameter("loop", "transpose", transpose).unwrap();
    engine
        .load_graph(GraphDescription::new().node("loop", &[]))
        .unwrap();
    engine
}

pub fn bench_warp(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/warp");
    group.sample_size(20);

    for &size in BLOCK_SIZES {
        // Beat-locked, no pitch shift
        let mut engine = warp_engine(size, 0.0);
        group.bench_with_input(BenchmarkId::new("stretch", size), &size, |b, _| {
            b.iter(|| engine.render(black_box(1.0), TimeUnit::Seconds).unwrap())
        });

        // Beat-locked and transposed
        let mut engine = warp_engine(size, 5.0);
        group.bench_with_input(BenchmarkId::new("transpose", size), &size, |b, _| {
            b.iter(|| engine.render(black_box(1.0), TimeUnit::Seconds).unwrap())
        });
    }

    group.finish();
}
