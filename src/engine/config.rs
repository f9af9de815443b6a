#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::timing::TempoInterpolation;
use crate::MAX_BLOCK_SIZE;

/// Engine-wide settings fixed at construction.
///
/// ```ignore
/// let config = EngineConfig::default()
///     .with_sample_rate(48_000.0)
///     .with_block_size(128)
///     .with_bpm(96.0);
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Frames per processing block. Affects speed and memory, never output.
    pub block_size: usize,
    /// Initial constant tempo.
    pub bpm: f64,
    pub tempo_interpolation: TempoInterpolation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            block_size: 512,
            bpm: 120.0,
            tempo_interpolation: TempoInterpolation::Step,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn with_tempo_interpolation(mut self, interpolation: TempoInterpolation) -> Self {
        self.tempo_interpolation = interpolation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(EngineError::InvalidSampleRate {
                sample_rate: self.sample_rate,
            });
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(EngineError::InvalidBlockSize {
                block_size: self.block_size,
            });
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(EngineError::InvalidTempo {
                index: 0,
                bpm: self.bpm,
            });
        }
        Ok(())
    }
}
