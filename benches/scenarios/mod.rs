//! Whole-engine render benchmarks.
//!
//! Each scenario renders one second of audio at 48kHz per iteration, so the
//! reported time is directly comparable to realtime.

mod scene;
mod voices;
mod warp;

pub use scene::bench_scene;
pub use voices::bench_voices;
pub use warp::bench_warp;
