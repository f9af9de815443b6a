#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unit of a duration or timestamp passed to the engine.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    /// Absolute wall-clock seconds, independent of tempo.
    #[default]
    Seconds,
    /// Quarter-note beats, resolved through the tempo map.
    Beats,
}

/// The one rounding rule used for every seconds -> samples conversion.
///
/// Round half up: 0.5 samples becomes 1. Render lengths and event timestamps
/// both go through here, so a note scheduled at the last sample of a render
/// always lands inside it.
#[inline]
pub fn round_half_up(samples: f64) -> u64 {
    if samples <= 0.0 {
        0
    } else {
        (samples + 0.5).floor() as u64
    }
}
