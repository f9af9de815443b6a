//! Low-level DSP primitives used by the graph nodes and built-in instruments.
//!
//! These components hold only their own state and never allocate while
//! processing, so they can be embedded directly inside nodes and voices. They
//! stay focused on the signal-processing math; timing, parameters and events
//! are handled a layer up.

/// Rational soft clip waveshaping.
pub mod distortion;
/// Gate-driven attack/decay/sustain/release envelope.
pub mod envelope;
/// Lagrange interpolation for fractional-position reads.
pub mod interpolate;
/// Sine oscillator and pitch helpers.
pub mod oscillator;
/// Tape-head style delay-line pitch shifter.
pub mod pitch_shift;

pub use envelope::{AdsrShape, Envelope, EnvelopeStage};
pub use interpolate::{lagrange, MAX_INTERPOLATION_ORDER};
pub use oscillator::{midi_note_to_freq, semitones_to_ratio, SineOscillator};
pub use pitch_shift::PitchShifter;
