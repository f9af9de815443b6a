#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Where on the timeline the source sounds.
///
/// `start` and `end` are engine beats; `offset` (source samples) is added to
/// the start marker, so a clip can begin partway into the material.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlacement {
    pub start: f64,
    pub end: f64,
    pub offset: f64,
}

impl ClipPlacement {
    pub fn new(start: f64, end: f64, offset: f64) -> Self {
        Self { start, end, offset }
    }

    /// The whole timeline, from beat 0 with no offset.
    pub fn everywhere() -> Self {
        Self::new(0.0, f64::INFINITY, 0.0)
    }
}

/// Sorted, non-overlapping clip placements.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Clips {
    clips: Vec<ClipPlacement>,
}

impl Default for Clips {
    fn default() -> Self {
        Self {
            clips: vec![ClipPlacement::everywhere()],
        }
    }
}

impl Clips {
    /// Sorts by start beat. Inverted or overlapping placements are rejected;
    /// the error index refers to the sorted order.
    pub fn new(mut clips: Vec<ClipPlacement>) -> Result<Self> {
        clips.sort_by(|a, b| a.start.total_cmp(&b.start));

        for (index, clip) in clips.iter().enumerate() {
            let valid = clip.start.is_finite()
                && clip.offset.is_finite()
                && !clip.end.is_nan()
                && clip.end > clip.start;
            if !valid {
                return Err(EngineError::InvalidClip { index });
            }
        }
        for (index, pair) in clips.windows(2).enumerate() {
            if pair[1].start < pair[0].end {
                return Err(EngineError::InvalidClip { index: index + 1 });
            }
        }
        Ok(Self { clips })
    }

    pub fn placements(&self) -> &[ClipPlacement] {
        &self.clips
    }

    /// The placement sounding at `beat`, if any.
    pub fn at(&self, beat: f64) -> Option<&ClipPlacement> {
        let ahead = self.clips.partition_point(|c| c.start <= beat);
        let clip = self.clips.get(ahead.checked_sub(1)?)?;
        (beat < clip.end).then_some(clip)
    }
}
