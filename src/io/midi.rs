#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Channel-less note events, as delivered to nodes during a render.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
}

impl MidiEvent {
    pub fn key(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { key, .. } | MidiEvent::NoteOff { key } => key,
        }
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self, MidiEvent::NoteOff { .. })
    }
}

/// A note as registered by the caller. `start` and `duration` are in the
/// unit given alongside it (seconds or beats).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub duration: f64,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8, start: f64, duration: f64) -> Self {
        Self {
            pitch,
            velocity,
            start,
            duration,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pitch > 127 || self.velocity > 127 {
            return Err(EngineError::InvalidNote {
                pitch: self.pitch,
                velocity: self.velocity,
            });
        }
        if !(self.start.is_finite() && self.start >= 0.0) {
            return Err(EngineError::InvalidDuration {
                duration: self.start,
            });
        }
        if !(self.duration.is_finite() && self.duration >= 0.0) {
            return Err(EngineError::InvalidDuration {
                duration: self.duration,
            });
        }
        Ok(())
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}
