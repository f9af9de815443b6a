use std::any::Any;

use crate::engine::automation::ParamSet;
use crate::engine::scheduler::BlockEvent;
use crate::error::Result;
use crate::timing::TempoMap;

#[cfg(feature = "serde")]
use crate::engine::persist::ProcessorState;

/// Context passed to processors for every block
///
/// - sample_rate: engine sample rate (e.g., 44100.0)
/// - start: absolute sample index of the block's first frame
/// - len: frames in this block (the last block of a render may be short)
/// - tempo: the engine's tempo map, for anything that follows the beat
pub struct BlockCtx<'a> {
    pub sample_rate: f64,
    pub start: u64,
    pub len: usize,
    pub tempo: &'a TempoMap,
}

impl<'a> BlockCtx<'a> {
    /// Absolute sample index of `frame` within this block.
    #[inline]
    pub fn sample(&self, frame: usize) -> u64 {
        self.start + frame as u64
    }

    /// Engine beat position at `frame` within this block.
    #[inline]
    pub fn beat_at(&self, frame: usize) -> f64 {
        self.tempo.beat_at_sample(self.sample(frame) as f64)
    }
}

/// Which input channel counts a processor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// A source: takes no audio input.
    None,
    Exactly(usize),
    /// Any non-zero multiple of the given count (one group per producer).
    MultipleOf(usize),
    Any,
}

impl InputLayout {
    pub fn accepts(&self, channels: usize) -> bool {
        match *self {
            InputLayout::None => channels == 0,
            InputLayout::Exactly(n) => channels == n,
            InputLayout::MultipleOf(n) => n > 0 && channels > 0 && channels % n == 0,
            InputLayout::Any => true,
        }
    }

    /// The closest count this layout would accept, for error messages.
    pub fn expected(&self, channels: usize) -> usize {
        match *self {
            InputLayout::None => 0,
            InputLayout::Exactly(n) => n,
            InputLayout::MultipleOf(n) => n * (channels / n.max(1)).max(1),
            InputLayout::Any => channels,
        }
    }
}

/// Core trait for nodes in a render graph
///
/// The engine owns every processor and drives it through a fixed life cycle:
///
///   configure  once per `load_graph`, with the final input channel count
///   reset      at the start of every render
///   process    once per block, in topological order
///
/// Parameter values are realized into the processor's `ParamSet` by the engine
/// before each `process` call, so processors read `params().at(i, frame)`.
pub trait Processor: Send + 'static {
    /// Short type name, used in logs.
    fn kind(&self) -> &'static str;

    fn input_layout(&self) -> InputLayout;

    /// Size internal state for `input_channels` inputs at `sample_rate`.
    /// Called after the engine has checked `input_layout`.
    fn configure(&mut self, input_channels: usize, sample_rate: f64) -> Result<()>;

    fn num_outputs(&self) -> usize;

    fn params(&self) -> &ParamSet;

    fn params_mut(&mut self) -> &mut ParamSet;

    /// Return to the state at t = 0. Settings and parameters are kept.
    fn reset(&mut self);

    /// Render one block.
    ///
    /// `inputs` holds one slice per input channel, `outputs` one buffer per
    /// output channel, each exactly `ctx.len` long. `events` are sorted by
    /// offset.
    fn process(
        &mut self,
        ctx: &BlockCtx,
        inputs: &[&[f32]],
        outputs: &mut [Vec<f32>],
        events: &[BlockEvent],
    ) -> Result<()>;

    /// Serializable state for engine snapshots. Processors that can't be
    /// captured return `None` and are skipped on save.
    #[cfg(feature = "serde")]
    fn snapshot(&self) -> Option<ProcessorState> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
