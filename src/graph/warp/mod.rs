use std::any::Any;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::interpolate::{lagrange, lagrange_looped, LoopBounds, MAX_INTERPOLATION_ORDER};
use crate::dsp::oscillator::semitones_to_ratio;
use crate::dsp::pitch_shift::PitchShifter;
use crate::engine::automation::{ParamSet, ParamSpec};
use crate::engine::scheduler::BlockEvent;
use crate::error::{EngineError, Result};
use crate::graph::node::{BlockCtx, InputLayout, Processor};
use crate::io::source::SourceBuffer;

#[cfg(feature = "serde")]
use crate::engine::persist::ProcessorState;

pub mod clip;
pub mod markers;

pub use clip::{ClipPlacement, Clips};
pub use markers::{WarpMarker, WarpMarkers};

/*
Beat-Synchronized Playback
==========================

The warp node answers one question per output sample: "which fractional
position of the source should be heard now?" Everything else (interpolation,
looping, pitch) hangs off that answer.

Two ways to find the position:

  Fixed ratio (no warp markers)
  -----------------------------
  The source plays at a constant speed from the start of the active clip,
  ignoring tempo:

      pos = start_marker + offset + elapsed * (source_rate / rate) / time_ratio

  where `elapsed` counts output samples since the clip began. With matching
  rates and time_ratio 1 this is an exact copy of the source.

  Beat-locked (with warp markers)
  -------------------------------
  Warp markers pin source positions to source beats. The engine's tempo map
  says which beat we are on, and the clip says which source beat that is:

      source_beat = beat_of(start_marker + offset) + (engine_beat - clip.start)
      pos         = sample_of(source_beat)

  Speed up the engine tempo and the material follows, because engine_beat
  advances faster.

Looping
-------
With a loop region set, positions that reach `loop_end` wrap back into
`[loop_start, loop_end)`. The wrap is a modulo on the fractional position in
whichever domain drives playback (samples for fixed ratio, beats when
beat-locked), so the phase of a periodic source carries across the seam.
Interpolation taps near the seam are read from the other side of the loop.

Silence
-------
Outside every clip, before the start marker, at or after the end marker, and
past the end of the source, the node outputs zeros. None of these are errors.

Transpose
---------
`transpose` (semitones, automatable) feeds a delay-line pitch shifter per
channel. The shifter always runs and is fed `latency` samples ahead of the
output, which cancels its delay: at 0 the output is the interpolated source,
bit-for-bit, and automating through 0 is continuous.
*/

const TRANSPOSE: usize = 0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct WarpNode {
    source: Arc<SourceBuffer>,
    markers: Option<WarpMarkers>,
    clips: Clips,
    time_ratio: f64,
    interpolation_order: usize,
    start_marker: f64,
    end_marker: Option<f64>,
    loop_region: Option<(f64, f64)>,
    params: ParamSet,
    #[cfg_attr(feature = "serde", serde(skip))]
    shifters: Vec<PitchShifter>,
    #[cfg_attr(feature = "serde", serde(skip))]
    frame: Vec<f32>,
    #[cfg_attr(feature = "serde", serde(skip))]
    primed: bool,
}

/// Where to read the source for one output sample.
#[derive(Debug, Clone, Copy)]
struct Read {
    pos: f64,
    bounds: Option<LoopBounds>,
}

impl WarpNode {
    pub fn new(source: Arc<SourceBuffer>) -> Self {
        Self {
            source,
            markers: None,
            clips: Clips::default(),
            time_ratio: 1.0,
            interpolation_order: 3,
            start_marker: 0.0,
            end_marker: None,
            loop_region: None,
            params: ParamSet::new([ParamSpec::new("transpose", 0.0, -96.0, 96.0)]),
            shifters: Vec::new(),
            frame: Vec::new(),
            primed: false,
        }
    }

    pub fn source(&self) -> &Arc<SourceBuffer> {
        &self.source
    }

    /// Swap the source data. A different channel count needs a reload.
    pub fn set_source(&mut self, source: Arc<SourceBuffer>) {
        self.source = source;
    }

    pub fn markers(&self) -> Option<&WarpMarkers> {
        self.markers.as_ref()
    }

    /// Beat-lock the source using these markers (source sample, source beat).
    pub fn set_warp_markers(&mut self, markers: Vec<WarpMarker>) -> Result<()> {
        self.markers = Some(WarpMarkers::new(markers)?);
        Ok(())
    }

    /// Beat-lock to material recorded at a steady `source_bpm`.
    pub fn set_markers_from_bpm(&mut self, source_bpm: f64) -> Result<()> {
        self.markers = Some(WarpMarkers::from_bpm(source_bpm, self.source.sample_rate())?);
        Ok(())
    }

    /// Back to fixed-ratio playback.
    pub fn clear_warp_markers(&mut self) {
        self.markers = None;
    }

    pub fn time_ratio(&self) -> f64 {
        self.time_ratio
    }

    /// Playback stretch when no markers are set: 2.0 plays at half speed.
    pub fn set_time_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(EngineError::InvalidTimeRatio { ratio });
        }
        self.time_ratio = ratio;
        Ok(())
    }

    pub fn interpolation_order(&self) -> usize {
        self.interpolation_order
    }

    pub fn set_interpolation_order(&mut self, order: usize) -> Result<()> {
        if order > MAX_INTERPOLATION_ORDER {
            return Err(EngineError::InvalidInterpolationOrder { order });
        }
        self.interpolation_order = order;
        Ok(())
    }

    /// Usable region of the source, in source samples. `None` for the end
    /// means "to the end of the source".
    pub fn set_region(&mut self, start: f64, end: Option<f64>) -> Result<()> {
        let end_value = end.unwrap_or(f64::INFINITY);
        if !(start.is_finite() && start >= 0.0 && !end_value.is_nan() && end_value > start) {
            return Err(EngineError::InvalidRegion {
                start,
                end: end_value,
            });
        }
        self.start_marker = start;
        self.end_marker = end;
        Ok(())
    }

    pub fn start_marker(&self) -> f64 {
        self.start_marker
    }

    pub fn end_marker(&self) -> Option<f64> {
        self.end_marker
    }

    /// Loop `[start, end)` in source samples.
    pub fn set_loop(&mut self, start: f64, end: f64) -> Result<()> {
        if !(start.is_finite() && end.is_finite() && start >= 0.0 && end > start) {
            return Err(EngineError::InvalidRegion { start, end });
        }
        self.loop_region = Some((start, end));
        Ok(())
    }

    pub fn clear_loop(&mut self) {
        self.loop_region = None;
    }

    pub fn loop_region(&self) -> Option<(f64, f64)> {
        self.loop_region
    }

    pub fn set_clips(&mut self, clips: Vec<ClipPlacement>) -> Result<()> {
        self.clips = Clips::new(clips)?;
        Ok(())
    }

    pub fn clips(&self) -> &[ClipPlacement] {
        self.clips.placements()
    }

    fn end_position(&self) -> f64 {
        let frames = self.source.num_frames() as f64;
        self.end_marker.map_or(frames, |end| end.min(frames))
    }

    /// Fractional source position for an output sample, or `None` for silence.
    fn position(&self, ctx: &BlockCtx, frame: usize) -> Option<Read> {
        let beat = ctx.beat_at(frame);
        let clip = self.clips.at(beat)?;
        let origin = self.start_marker + clip.offset;

        let read = match &self.markers {
            None => {
                let clip_start = ctx.tempo.sample_at_beat(clip.start);
                let elapsed = ctx.sample(frame) as f64 - clip_start;
                let step = (self.source.sample_rate() / ctx.sample_rate) / self.time_ratio;
                let pos = origin + elapsed * step;
                match self.loop_region {
                    Some((start, end)) if pos >= start => {
                        let wrapped = pos >= end;
                        Read {
                            pos: if wrapped {
                                start + (pos - start).rem_euclid(end - start)
                            } else {
                                pos
                            },
                            bounds: Some(LoopBounds {
                                start,
                                end,
                                wrapped,
                            }),
                        }
                    }
                    _ => Read { pos, bounds: None },
                }
            }
            Some(markers) => {
                let source_beat = markers.sample_to_beat(origin) + (beat - clip.start);
                match self.loop_region {
                    Some((start, end)) if source_beat >= markers.sample_to_beat(start) => {
                        let loop_start = markers.sample_to_beat(start);
                        let loop_end = markers.sample_to_beat(end);
                        let wrapped = source_beat >= loop_end;
                        let source_beat = if wrapped {
                            loop_start + (source_beat - loop_start).rem_euclid(loop_end - loop_start)
                        } else {
                            source_beat
                        };
                        Read {
                            pos: markers.beat_to_sample(source_beat),
                            bounds: Some(LoopBounds {
                                start,
                                end,
                                wrapped,
                            }),
                        }
                    }
                    _ => Read {
                        pos: markers.beat_to_sample(source_beat),
                        bounds: None,
                    },
                }
            }
        };

        (read.pos >= self.start_marker && read.pos < self.end_position()).then_some(read)
    }

    /// Interpolate every channel at `frame` into `self.frame`.
    fn read_frame(&mut self, ctx: &BlockCtx, frame: usize) {
        let Some(read) = self.position(ctx, frame) else {
            self.frame.fill(0.0);
            return;
        };
        for (c, value) in self.frame.iter_mut().enumerate() {
            let channel = self.source.channel(c);
            *value = match read.bounds {
                Some(bounds) => lagrange_looped(channel, read.pos, self.interpolation_order, bounds),
                None => lagrange(channel, read.pos, self.interpolation_order),
            };
        }
    }

    fn latency(&self) -> usize {
        self.shifters.first().map_or(0, PitchShifter::latency)
    }
}

impl Processor for WarpNode {
    fn kind(&self) -> &'static str {
        "warp"
    }

    fn input_layout(&self) -> InputLayout {
        InputLayout::None
    }

    fn configure(&mut self, _input_channels: usize, sample_rate: f64) -> Result<()> {
        let channels = self.source.num_channels();
        self.shifters = (0..channels).map(|_| PitchShifter::new(sample_rate)).collect();
        self.frame = vec![0.0; channels];
        self.primed = false;
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

    fn reset(&mut self) {
        for shifter in &mut self.shifters {
            shifter.reset();
        }
        self.primed = false;
    }

    fn process(
        &mut self,
        ctx: &BlockCtx,
        _inputs: &[&[f32]],
        outputs: &mut [Vec<f32>],
        _events: &[BlockEvent],
    ) -> Result<()> {
        if self.shifters.len() != outputs.len() {
            self.configure(0, ctx.sample_rate)?;
        }

        let latency = self.latency();
        if !self.primed {
            for n in 0..latency {
                self.read_frame(ctx, n);
                for (shifter, &value) in self.shifters.iter_mut().zip(&self.frame) {
                    shifter.push(value);
                }
            }
            self.primed = true;
        }

        for n in 0..ctx.len {
            self.read_frame(ctx, n + latency);
            let ratio = semitones_to_ratio(self.params.at(TRANSPOSE, n) as f64);
            for ((out, shifter), &value) in outputs.iter_mut().zip(&mut self.shifters).zip(&self.frame) {
                out[n] = shifter.next_sample(value, ratio);
            }
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    fn snapshot(&self) -> Option<ProcessorState> {
        Some(ProcessorState::Warp(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
