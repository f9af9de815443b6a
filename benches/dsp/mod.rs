//! Benchmarks for low-level DSP primitives.

mod interpolate;
mod pitch_shift;

pub use interpolate::bench_interpolate;
pub use pitch_shift::bench_pitch_shift;
