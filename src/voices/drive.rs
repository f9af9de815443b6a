//! Drive post-stage.
//!
//! Saturates the summed voices of a poly node. Many notes stacked on one
//! sine instrument add up past full scale; running the mix through a soft
//! clip keeps peaks bounded while light drive settings stay nearly clean.
//!
//! # Controls
//!
//! - `drive`: 1.0 = gentle, 10.0 = heavy
//! - `mix`: dry/wet balance, 0.0 = dry, 1.0 = fully driven

use crate::dsp::distortion::saturate;
use crate::engine::automation::ParamSpec;
use crate::synth::instrument::{ControlSpec, Instrument};

const DRIVE: usize = 0;
const MIX: usize = 1;

pub struct Drive {
    controls: Vec<ControlSpec>,
    channels: usize,
}

impl Drive {
    pub fn new(channels: usize) -> Self {
        Self {
            controls: vec![
                ParamSpec::new("drive", 1.0, 0.1, 50.0),
                ParamSpec::new("mix", 1.0, 0.0, 1.0),
            ],
            channels,
        }
    }
}

impl Instrument for Drive {
    fn controls(&self) -> &[ControlSpec] {
        &self.controls
    }

    fn num_inputs(&self) -> usize {
        self.channels
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }

    fn tick(&mut self, controls: &[f32], input: &[f32], output: &mut [f32]) {
        let drive = controls[DRIVE];
        let wet = controls[MIX];
        for (out, &dry) in output.iter_mut().zip(input) {
            *out = dry * (1.0 - wet) + saturate(dry, drive) * wet;
        }
    }

    fn reset(&mut self) {}
}
