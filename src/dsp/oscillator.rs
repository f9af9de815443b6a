use std::f64::consts::TAU;

/// Phase-accumulating sine oscillator.
///
/// Phase is kept in `f64` and wrapped every sample, so long renders don't
/// drift in pitch as the accumulator grows.
#[derive(Debug, Clone, Default)]
pub struct SineOscillator {
    phase: f64,
}

impl SineOscillator {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    /// Next sample at `frequency` Hz, then advance the phase.
    #[inline]
    pub fn next(&mut self, frequency: f64, sample_rate: f64) -> f32 {
        let out = (self.phase * TAU).sin() as f32;
        self.phase = (self.phase + frequency / sample_rate).rem_euclid(1.0);
        out
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: f64) {
        self.phase = phase.rem_euclid(1.0);
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Convert MIDI note number to frequency in Hz.
/// A4 = 440 Hz = MIDI note 69
#[inline]
pub fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// Frequency ratio for a pitch shift in semitones.
#[inline]
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    2.0_f64.powf(semitones / 12.0)
}
