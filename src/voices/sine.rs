//! Sine voice.
//!
//! The simplest pitched instrument: one sine oscillator shaped by a linear
//! ADSR envelope. Useful as a reference tone when checking timing, since
//! every note starts from zero phase and the envelope makes onsets and
//! releases easy to spot in a waveform.
//!
//! # Controls
//!
//! - `freq`, `gain`, `gate`: driven per note by the voice manager
//! - `attack`, `decay`, `release`: stage times in seconds
//! - `sustain`: held level while the gate is high
//! - `level`: output trim

use crate::dsp::envelope::{AdsrShape, Envelope};
use crate::dsp::oscillator::SineOscillator;
use crate::engine::automation::ParamSpec;
use crate::synth::instrument::{ControlSpec, Instrument};

const FREQ: usize = 0;
const GAIN: usize = 1;
const GATE: usize = 2;
const ATTACK: usize = 3;
const DECAY: usize = 4;
const SUSTAIN: usize = 5;
const RELEASE: usize = 6;
const LEVEL: usize = 7;

pub struct SineVoice {
    controls: Vec<ControlSpec>,
    osc: SineOscillator,
    env: Envelope,
    sample_rate: f64,
}

impl SineVoice {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            controls: vec![
                ParamSpec::new("freq", 440.0, 0.0, 24_000.0),
                ParamSpec::new("gain", 1.0, 0.0, 1.0),
                ParamSpec::new("gate", 0.0, 0.0, 1.0),
                ParamSpec::new("attack", 0.005, 0.0, 10.0),
                ParamSpec::new("decay", 0.1, 0.0, 10.0),
                ParamSpec::new("sustain", 0.7, 0.0, 1.0),
                ParamSpec::new("release", 0.2, 0.0, 10.0),
                ParamSpec::new("level", 0.3, 0.0, 1.0),
            ],
            osc: SineOscillator::new(),
            env: Envelope::new(),
            sample_rate,
        }
    }
}

impl Instrument for SineVoice {
    fn controls(&self) -> &[ControlSpec] {
        &self.controls
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn tick(&mut self, controls: &[f32], _input: &[f32], output: &mut [f32]) {
        let shape = AdsrShape {
            attack: controls[ATTACK],
            decay: controls[DECAY],
            sustain: controls[SUSTAIN],
            release: controls[RELEASE],
        };
        if controls[GATE] > 0.0 && !self.env.is_active() {
            self.osc.reset();
        }
        let env = self.env.next(controls[GATE], &shape, self.sample_rate as f32);
        let tone = self.osc.next(controls[FREQ] as f64, self.sample_rate);
        let sample = tone * env * controls[GAIN] * controls[LEVEL];
        output.fill(sample);
    }

    fn reset(&mut self) {
        self.osc.reset();
        self.env.reset();
    }
}
