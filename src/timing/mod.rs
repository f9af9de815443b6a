//! Tempo and time conversion.
//!
//! Everything that turns beats or seconds into sample positions lives here.

pub mod duration;
pub mod tempo_map;
pub mod units;

pub use duration::Duration;
pub use tempo_map::{TempoInterpolation, TempoMap, DEFAULT_PPQN};
pub use units::{round_half_up, TimeUnit};
