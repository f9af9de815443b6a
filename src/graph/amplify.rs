use std::any::Any;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::automation::{ParamSet, ParamSpec};
use crate::engine::scheduler::BlockEvent;
use crate::error::Result;
use crate::graph::node::{BlockCtx, InputLayout, Processor};

#[cfg(feature = "serde")]
use crate::engine::persist::ProcessorState;

const GAIN: usize = 0;

/// Multiplies every input channel by the automatable `gain` parameter.
/// Output channel count follows the input.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct GainNode {
    channels: usize,
    params: ParamSet,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self {
            channels: 0,
            params: ParamSet::new([ParamSpec::new("gain", gain, 0.0, 16.0)]),
        }
    }
}

impl Processor for GainNode {
    fn kind(&self) -> &'static str {
        "gain"
    }

    fn input_layout(&self) -> InputLayout {
        InputLayout::Any
    }

    fn configure(&mut self, input_channels: usize, _sample_rate: f64) -> Result<()> {
        self.channels = input_channels;
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

    fn reset(&mut self) {}

    fn process(
        &mut self,
        _ctx: &BlockCtx,
        inputs: &[&[f32]],
        outputs: &mut [Vec<f32>],
        _events: &[BlockEvent],
    ) -> Result<()> {
        let gain = self.params.block(GAIN);
        for (out, input) in outputs.iter_mut().zip(inputs) {
            for ((o, i), g) in out.iter_mut().zip(input.iter()).zip(gain) {
                *o = *i * *g;
            }
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    fn snapshot(&self) -> Option<ProcessorState> {
        Some(ProcessorState::Gain(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
