//! Benchmarks for fractional-position reads.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::dsp::interpolate::lagrange;

use crate::BLOCK_SIZES;

pub fn bench_interpolate(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/interpolate");
    let source: Vec<f32> = (0..48_000).map(|i| (i as f32 * 0.01).sin()).collect();

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Order 0 is a plain indexed read; 3 is the warp default; 7 the maximum
        for order in [0usize, 1, 3, 7] {
            group.bench_with_input(
                BenchmarkId::new(format!("order{order}"), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        for (n, out) in buffer.iter_mut().enumerate() {
                            let position = 1000.0 + n as f64 * 0.73;
                            *out = lagrange(black_box(&source), position, order);
                        }
                    })
                },
            );
        }
    }

    group.finish();
}
