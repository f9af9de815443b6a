#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Fixed PCM data played back by playback and warp nodes.
///
/// Nodes hold it behind an `Arc`, so one decoded file can feed any number of
/// nodes and renders without copying. Rendering never mutates it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f64,
}

impl SourceBuffer {
    /// `channels` is channel-major: `channels[c][frame]`.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: f64) -> Result<Self> {
        if channels.is_empty() {
            return Err(EngineError::InvalidSource {
                reason: "no channels".into(),
            });
        }
        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(EngineError::InvalidSource {
                reason: "channels differ in length".into(),
            });
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::InvalidSource {
                reason: format!("sample rate {}", sample_rate),
            });
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Single-channel source.
    pub fn mono(samples: Vec<f32>, sample_rate: f64) -> Result<Self> {
        Self::new(vec![samples], sample_rate)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Length in seconds at the source's own sample rate.
    pub fn duration_seconds(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate
    }
}
