use std::any::Any;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::SineOscillator;
use crate::engine::automation::{ParamSet, ParamSpec};
use crate::engine::scheduler::BlockEvent;
use crate::error::{EngineError, Result};
use crate::graph::node::{BlockCtx, InputLayout, Processor};

#[cfg(feature = "serde")]
use crate::engine::persist::ProcessorState;

/*
Test-Tone Oscillator
====================

A sine source with two automatable parameters:

  freq   frequency in Hz
  gain   linear output level

The same signal is written to every output channel. Because both parameters
are realized per sample by the engine, a frequency sweep automated in beats
lands on the same samples whatever the block size. Phase is continuous across
blocks and starts at zero on every render.
*/

const FREQ: usize = 0;
const GAIN: usize = 1;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct OscillatorNode {
    channels: usize,
    params: ParamSet,
    #[cfg_attr(feature = "serde", serde(skip))]
    osc: SineOscillator,
    #[cfg_attr(feature = "serde", serde(skip))]
    sample_rate: f64,
}

impl OscillatorNode {
    pub fn new(frequency: f32, channels: usize) -> Result<Self> {
        if channels == 0 {
            return Err(EngineError::InvalidChannelCount { channels });
        }
        Ok(Self {
            channels,
            params: ParamSet::new([
                ParamSpec::new("freq", frequency, 0.0, 24_000.0),
                ParamSpec::new("gain", 1.0, 0.0, 16.0),
            ]),
            osc: SineOscillator::new(),
            sample_rate: 0.0,
        })
    }
}

impl Processor for OscillatorNode {
    fn kind(&self) -> &'static str {
        "oscillator"
    }

    fn input_layout(&self) -> InputLayout {
        InputLayout::None
    }

    fn configure(&mut self, _input_channels: usize, sample_rate: f64) -> Result<()> {
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn reset(&mut self) {
        self.osc.reset();
    }

    fn process(
        &mut self,
        ctx: &BlockCtx,
        _inputs: &[&[f32]],
        outputs: &mut [Vec<f32>],
        _events: &[BlockEvent],
    ) -> Result<()> {
        let Some((first, rest)) = outputs.split_first_mut() else {
            return Ok(());
        };

        for (n, sample) in first.iter_mut().enumerate().take(ctx.len) {
            let freq = self.params.at(FREQ, n) as f64;
            *sample = self.osc.next(freq, ctx.sample_rate) * self.params.at(GAIN, n);
        }
        for channel in rest {
            channel.copy_from_slice(first);
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    fn snapshot(&self) -> Option<ProcessorState> {
        Some(ProcessorState::Oscillator(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
