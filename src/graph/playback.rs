use std::any::Any;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::automation::ParamSet;
use crate::engine::scheduler::BlockEvent;
use crate::error::Result;
use crate::graph::node::{BlockCtx, InputLayout, Processor};
use crate::io::source::SourceBuffer;

#[cfg(feature = "serde")]
use crate::engine::persist::ProcessorState;

/// Plays a source buffer from sample 0, one source frame per output frame.
///
/// No resampling and no gain stage: output frame n is source frame n, bit for
/// bit, and silence once the source runs out. Use a warp node when the source
/// rate differs from the engine rate or timing should follow the tempo.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct PlaybackNode {
    source: Arc<SourceBuffer>,
    params: ParamSet,
}

impl PlaybackNode {
    pub fn new(source: Arc<SourceBuffer>) -> Self {
        Self {
            source,
            params: ParamSet::default(),
        }
    }

    pub fn source(&self) -> &Arc<SourceBuffer> {
        &self.source
    }

    /// Swap the source data. A different channel count needs a reload.
    pub fn set_source(&mut self, source: Arc<SourceBuffer>) {
        self.source = source;
    }
}

impl Processor for PlaybackNode {
    fn kind(&self) -> &'static str {
        "playback"
    }

    fn input_layout(&self) -> InputLayout {
        InputLayout::None
    }

    fn configure(&mut self, _input_channels: usize, _sample_rate: f64) -> Result<()> {
        Ok(())
    }

    fn num_outputs(&self) -> usize {
        self.source.num_channels()
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
        _inputs: &[&[f32]],
        outputs: &mut [Vec<f32>],
        _events: &[BlockEvent],
    ) -> Result<()> {
        let frames = self.source.num_frames();
        let start = (ctx.start as usize).min(frames);
        let end = (start + ctx.len).min(frames);
        let available = end - start;

        for (c, out) in outputs.iter_mut().enumerate() {
            let data = &self.source.channel(c)[start..end];
            out[..available].copy_from_slice(data);
            out[available..].fill(0.0);
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    fn snapshot(&self) -> Option<ProcessorState> {
        Some(ProcessorState::Playback(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
