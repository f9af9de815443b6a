use std::any::Any;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::automation::{ParamSet, ParamSpec};
use crate::engine::scheduler::BlockEvent;
use crate::error::{EngineError, Result};
use crate::graph::node::{BlockCtx, InputLayout, Processor};

#[cfg(feature = "serde")]
use crate::engine::persist::ProcessorState;

/*
Summing Bus
===========

Adds its producers together. The engine hands consumers one flat list of
input channels (the producers' outputs concatenated in listed order), so the
bus splits that list into groups of `channels`:

   inputs:  [A.L, A.R, B.L, B.R, C.L, C.R]       channels = 2
   groups:   \__A___/  \__B___/  \__C___/
   output:  L = gA*A.L + gB*B.L + gC*C.L
            R = gA*A.R + gB*B.R + gC*C.R

Each group gets its own automatable level, `input<i>/gain` (1-based), declared
once the number of producers is known at load time.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct AddNode {
    channels: usize,
    params: ParamSet,
}

impl AddNode {
    pub fn new(channels: usize) -> Result<Self> {
        if channels == 0 {
            return Err(EngineError::InvalidChannelCount { channels });
        }
        Ok(Self {
            channels,
            params: ParamSet::default(),
        })
    }

    fn gain_spec(group: usize) -> ParamSpec {
        ParamSpec::new(format!("input{}/gain", group + 1), 1.0, 0.0, 16.0)
    }
}

impl Processor for AddNode {
    fn kind(&self) -> &'static str {
        "add"
    }

    fn input_layout(&self) -> InputLayout {
        InputLayout::MultipleOf(self.channels)
    }

    fn configure(&mut self, input_channels: usize, _sample_rate: f64) -> Result<()> {
        let groups = input_channels / self.channels;
        self.params.redeclare((0..groups).map(Self::gain_spec));
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
        ctx: &BlockCtx,
        inputs: &[&[f32]],
        outputs: &mut [Vec<f32>],
        _events: &[BlockEvent],
    ) -> Result<()> {
        for out in outputs.iter_mut() {
            out.fill(0.0);
        }

        for (group, chunk) in inputs.chunks(self.channels).enumerate() {
            let gain = self.params.block(group);
            for (out, input) in outputs.iter_mut().zip(chunk) {
                for n in 0..ctx.len {
                    out[n] += input[n] * gain[n];
                }
            }
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    fn snapshot(&self) -> Option<ProcessorState> {
        Some(ProcessorState::Add(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
