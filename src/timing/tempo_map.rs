#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::timing::units::round_half_up;

/*
Tempo Map
=========

Every timestamp in the engine eventually becomes a sample index, and every
musical position (beats) has to go through the tempo curve to get there.

The curve is a list of BPM values, one per tick, at a caller-chosen PPQN
(pulses per quarter note). Tick k starts at beat k / ppqn. After the last tick
the last BPM is held forever.

Between ticks the instantaneous tempo is either:

  Step    held at the tick's value until the next tick
  Linear  interpolated linearly towards the next tick's value

Time from beats: integrate seconds-per-beat over the curve.

    dt/db = 60 / bpm(b)

  Step segment (bpm = a):
      t(x) = 60 x / a

  Linear segment (bpm = a + s x, s in BPM per beat):
      t(x) = (60 / s) ln(1 + s x / a)

Both have closed-form inverses:

      x(t) = a t / 60                       (step)
      x(t) = a (exp(s t / 60) - 1) / s      (linear)

so conversions in either direction are exact up to floating point, and
monotonic because bpm > 0 everywhere. We keep a table with the absolute
seconds at the start of every tick; a lookup is one binary search plus one
segment evaluation.

The table is owned by the map. Replacing the curve or the sample rate means
building a new map, so no stale conversions survive.
*/

/// How the tempo behaves between two ticks of a tempo curve.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempoInterpolation {
    /// Hold each tick's BPM until the next tick.
    #[default]
    Step,
    /// Ramp linearly between adjacent ticks.
    Linear,
}

/// Default tick resolution for constant-tempo maps.
pub const DEFAULT_PPQN: u32 = 960;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    sample_rate: f64,
    ppqn: u32,
    bpms: Vec<f64>,
    interpolation: TempoInterpolation,
    /// Absolute seconds at the start of each tick.
    tick_seconds: Vec<f64>,
}

impl TempoMap {
    /// A single tempo for the whole timeline.
    pub fn constant(bpm: f64, sample_rate: f64) -> Result<Self> {
        Self::from_curve(vec![bpm], DEFAULT_PPQN, TempoInterpolation::Step, sample_rate)
    }

    /// A tempo curve with one BPM value per tick at `ppqn` ticks per beat.
    pub fn from_curve(
        bpms: Vec<f64>,
        ppqn: u32,
        interpolation: TempoInterpolation,
        sample_rate: f64,
    ) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::InvalidSampleRate { sample_rate });
        }
        if ppqn == 0 {
            return Err(EngineError::InvalidPpqn);
        }
        if bpms.is_empty() {
            return Err(EngineError::EmptyTempoCurve);
        }
        if let Some((index, &bpm)) = bpms
            .iter()
            .enumerate()
            .find(|(_, bpm)| !(bpm.is_finite() && **bpm > 0.0))
        {
            return Err(EngineError::InvalidTempo { index, bpm });
        }

        let mut map = Self {
            sample_rate,
            ppqn,
            bpms,
            interpolation,
            tick_seconds: Vec::new(),
        };
        map.rebuild_table();
        Ok(map)
    }

    /// Same curve at a different sample rate.
    pub fn with_sample_rate(&self, sample_rate: f64) -> Result<Self> {
        Self::from_curve(self.bpms.clone(), self.ppqn, self.interpolation, sample_rate)
    }

    fn rebuild_table(&mut self) {
        let tick_beats = 1.0 / self.ppqn as f64;
        let mut seconds = 0.0;
        self.tick_seconds = Vec::with_capacity(self.bpms.len());
        for k in 0..self.bpms.len() {
            self.tick_seconds.push(seconds);
            seconds += self.segment_seconds(k, tick_beats);
        }
    }

    /// Start BPM and slope (BPM per beat) of the segment beginning at tick k.
    #[inline]
    fn segment(&self, k: usize) -> (f64, f64) {
        let a = self.bpms[k];
        let slope = match self.interpolation {
            TempoInterpolation::Linear if k + 1 < self.bpms.len() => {
                (self.bpms[k + 1] - a) * self.ppqn as f64
            }
            _ => 0.0,
        };
        (a, slope)
    }

    /// Seconds elapsed after `x` beats into segment k.
    #[inline]
    fn segment_seconds(&self, k: usize, x: f64) -> f64 {
        let (a, s) = self.segment(k);
        if s.abs() < 1e-12 {
            60.0 * x / a
        } else {
            (60.0 / s) * (s * x / a).ln_1p()
        }
    }

    /// Beats elapsed after `t` seconds into segment k.
    #[inline]
    fn segment_beats(&self, k: usize, t: f64) -> f64 {
        let (a, s) = self.segment(k);
        if s.abs() < 1e-12 {
            a * t / 60.0
        } else {
            a * (s * t / 60.0).exp_m1() / s
        }
    }

    #[inline]
    fn tick_index(&self, beat: f64) -> usize {
        let tick = (beat * self.ppqn as f64).floor();
        (tick.max(0.0) as usize).min(self.bpms.len() - 1)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn ppqn(&self) -> u32 {
        self.ppqn
    }

    pub fn interpolation(&self) -> TempoInterpolation {
        self.interpolation
    }

    pub fn bpms(&self) -> &[f64] {
        &self.bpms
    }

    pub fn is_constant(&self) -> bool {
        self.bpms.len() == 1
    }

    /// Instantaneous tempo at a beat position.
    pub fn bpm_at_beat(&self, beat: f64) -> f64 {
        if beat <= 0.0 {
            return self.bpms[0];
        }
        let k = self.tick_index(beat);
        let (a, s) = self.segment(k);
        a + s * (beat - k as f64 / self.ppqn as f64)
    }

    pub fn seconds_at_beat(&self, beat: f64) -> f64 {
        if beat <= 0.0 {
            return 60.0 * beat / self.bpms[0];
        }
        let k = self.tick_index(beat);
        let x = beat - k as f64 / self.ppqn as f64;
        self.tick_seconds[k] + self.segment_seconds(k, x)
    }

    pub fn beat_at_seconds(&self, seconds: f64) -> f64 {
        if seconds <= 0.0 {
            return seconds * self.bpms[0] / 60.0;
        }
        // Last tick whose start is at or before `seconds`.
        let k = self
            .tick_seconds
            .partition_point(|&start| start <= seconds)
            .saturating_sub(1);
        k as f64 / self.ppqn as f64 + self.segment_beats(k, seconds - self.tick_seconds[k])
    }

    pub fn seconds_at_sample(&self, sample: f64) -> f64 {
        sample / self.sample_rate
    }

    /// Fractional sample position of a time in seconds.
    pub fn sample_at_seconds(&self, seconds: f64) -> f64 {
        seconds * self.sample_rate
    }

    pub fn beat_at_sample(&self, sample: f64) -> f64 {
        self.beat_at_seconds(sample / self.sample_rate)
    }

    /// Fractional sample position of a beat.
    pub fn sample_at_beat(&self, beat: f64) -> f64 {
        self.seconds_at_beat(beat) * self.sample_rate
    }

    /// Sample index of a beat under the engine's rounding rule.
    pub fn sample_index_at_beat(&self, beat: f64) -> u64 {
        round_half_up(self.sample_at_beat(beat))
    }

    /// Sample index of a time in seconds under the engine's rounding rule.
    pub fn sample_index_at_seconds(&self, seconds: f64) -> u64 {
        round_half_up(self.sample_at_seconds(seconds))
    }
}
