#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// One anchor between the source and the musical grid.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpMarker {
    /// Position in the source, in source samples.
    pub sample: f64,
    /// Source beat that position is pinned to.
    pub beat: f64,
}

impl WarpMarker {
    pub fn new(sample: f64, beat: f64) -> Self {
        Self { sample, beat }
    }
}

/// Piecewise-linear map between source samples and source beats.
///
/// Between two markers the map is a straight line. Before the first and after
/// the last marker the outer segments are extended, so every position has a
/// beat and every beat a position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct WarpMarkers {
    markers: Vec<WarpMarker>,
}

impl WarpMarkers {
    pub fn new(markers: Vec<WarpMarker>) -> Result<Self> {
        if markers.len() < 2 {
            return Err(EngineError::TooFewWarpMarkers {
                count: markers.len(),
            });
        }
        for (index, pair) in markers.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            let finite = b.sample.is_finite() && b.beat.is_finite();
            if !(finite && b.sample > a.sample && b.beat > a.beat) {
                return Err(EngineError::NonMonotonicWarpMarkers { index: index + 1 });
            }
        }
        if !(markers[0].sample.is_finite() && markers[0].beat.is_finite()) {
            return Err(EngineError::NonMonotonicWarpMarkers { index: 0 });
        }
        Ok(Self { markers })
    }

    /// Markers for material recorded at a steady `bpm`: beat 0 at sample 0
    /// and one beat every `60 / bpm` seconds of source.
    pub fn from_bpm(bpm: f64, source_rate: f64) -> Result<Self> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(EngineError::InvalidTempo { index: 0, bpm });
        }
        Self::new(vec![
            WarpMarker::new(0.0, 0.0),
            WarpMarker::new(source_rate * 60.0 / bpm, 1.0),
        ])
    }

    pub fn markers(&self) -> &[WarpMarker] {
        &self.markers
    }

    /// Index of the segment (pair `k`, `k + 1`) used for extrapolated lookups.
    #[inline]
    fn segment(&self, ahead: usize) -> usize {
        ahead.saturating_sub(1).min(self.markers.len() - 2)
    }

    pub fn sample_to_beat(&self, sample: f64) -> f64 {
        let k = self.segment(self.markers.partition_point(|m| m.sample <= sample));
        let (a, b) = (self.markers[k], self.markers[k + 1]);
        a.beat + (sample - a.sample) * (b.beat - a.beat) / (b.sample - a.sample)
    }

    pub fn beat_to_sample(&self, beat: f64) -> f64 {
        let k = self.segment(self.markers.partition_point(|m| m.beat <= beat));
        let (a, b) = (self.markers[k], self.markers[k + 1]);
        a.sample + (beat - a.beat) * (b.sample - a.sample) / (b.beat - a.beat)
    }
}
