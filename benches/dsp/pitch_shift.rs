//! Benchmarks for the delay-line pitch shifter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::dsp::pitch_shift::PitchShifter;

use crate::BLOCK_SIZES;

pub fn bench_pitch_shift(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/pitch_shift");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut buffer = vec![0.0f32; size];

        // Octave up - both taps move
        let mut shifter = PitchShifter::new(48_000.0);
        group.bench_with_input(BenchmarkId::new("octave_up", size), &size, |b, _| {
            b.iter(|| {
                for (out, x) in buffer.iter_mut().zip(&input) {
                    *out = shifter.next_sample(black_box(*x), 2.0);
                }
            })
        });

        // Unity - pure delay, taps parked
        let mut shifter = PitchShifter::new(48_000.0);
        group.bench_with_input(BenchmarkId::new("unity", size), &size, |b, _| {
            b.iter(|| {
                for (out, x) in buffer.iter_mut().zip(&input) {
                    *out = shifter.next_sample(black_box(*x), 1.0);
                }
            })
        });
    }

    group.finish();
}
