use crate::MIN_TIME;

/*
Gate-Driven ADSR Envelope
=========================

A linear attack/decay/sustain/release generator driven by a gate signal
instead of explicit note_on/note_off calls. Instruments see the gate as an
ordinary control value (1.0 = held, 0.0 = released), so the envelope simply
watches for edges:

  rising edge   (gate goes > 0.5)   -> Attack, from the current level
  falling edge  (gate goes <= 0.5)  -> Release, from the current level

Starting both phases from the current level means a retriggered or
early-released voice never jumps, so there is no click.

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
        Attack Decay  Sustain  Release

Stage times are read every sample from the `AdsrShape` passed to `next`, so
they can be automated while a note is sounding. Per-sample increments:

    attack   1 / (attack * sample_rate)
    decay    (1 - sustain) / (decay * sample_rate)
    release  release_start / (release * sample_rate)

The release increment uses the level captured at the falling edge, so the
ramp always lands on 0.0 after `release` seconds whatever stage it left.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Stage times in seconds plus the sustain level (0.0 - 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrShape {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for AdsrShape {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Envelope {
    stage: EnvelopeStage,
    level: f32,
    gate_high: bool,
    release_start: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            gate_high: false,
            release_start: 0.0,
        }
    }

    /// Advance one sample and return the new level.
    pub fn next(&mut self, gate: f32, shape: &AdsrShape, sample_rate: f32) -> f32 {
        let high = gate > 0.5;
        if high && !self.gate_high {
            self.stage = EnvelopeStage::Attack;
        } else if !high && self.gate_high && self.stage != EnvelopeStage::Idle {
            self.release_start = self.level;
            self.stage = EnvelopeStage::Release;
        }
        self.gate_high = high;

        let sustain = shape.sustain.clamp(0.0, 1.0);
        match self.stage {
            EnvelopeStage::Idle => self.level = 0.0,
            EnvelopeStage::Attack => {
                self.level += 1.0 / (shape.attack.max(MIN_TIME) * sample_rate);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                self.level -= (1.0 - sustain) / (shape.decay.max(MIN_TIME) * sample_rate);
                if self.level <= sustain {
                    self.level = sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => self.level = sustain,
            EnvelopeStage::Release => {
                self.level -= self.release_start / (shape.release.max(MIN_TIME) * sample_rate);
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        self.level
    }

    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }
}
