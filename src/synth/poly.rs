use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::midi_note_to_freq;
use crate::engine::automation::ParamSet;
use crate::engine::scheduler::BlockEvent;
use crate::error::{EngineError, Result};
use crate::graph::node::{BlockCtx, InputLayout, Processor};
use crate::io::midi::MidiEvent;
use crate::synth::allocator::{choose_voice, find_voice};
use crate::synth::instrument::{
    is_reserved, ControlSpec, Instrument, InstrumentFactory, FREQ, GAIN, GATE,
};
use crate::synth::voice::{Voice, VoiceState};
use crate::timing::round_half_up;

#[cfg(feature = "serde")]
use crate::engine::persist::ProcessorState;

/*
Polyphonic Voice Manager
========================

A PolyNode plays notes on a fixed-size pool of instrument instances.

  note-on   -> pick a voice (idle, else oldest releasing, else oldest
               active), bind it to the note, gate = 1
  note-off  -> gate = 0 on the voice holding that note; after
               `release_seconds` it returns to the idle pool

Rendering runs one frame at a time so events land on their exact sample:

  for each frame n:
      apply events whose offset == n
      for each sounding voice:
          controls = params at n + freq/gain/gate from the voice's note
          mix += instrument.tick(controls)
      output = effect.tick(effect params at n, mix)   (or mix if no effect)

Parameters
----------
Every instrument control other than freq/gain/gate becomes a parameter.
How voices share them depends on the addressing mode:

  Grouped    voice/<control>        one value, broadcast to every voice
  PerVoice   voice<i>/<control>     an independent copy per voice (1-based)

The optional post-stage's controls are `effect/<control>`.

With identical values in every per-voice copy the two modes produce
numerically identical output, since each voice sees the same control vector.
*/

/// How voice parameters are exposed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceAddressing {
    #[default]
    Grouped,
    PerVoice,
}

/// Default time a voice keeps sounding after its note-off.
pub const DEFAULT_RELEASE_SECONDS: f64 = 0.5;

/// Everything needed to rebuild a poly node from an instrument registry.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct PolyState {
    pub instrument_key: String,
    pub effect_key: Option<String>,
    pub num_voices: usize,
    pub addressing: VoiceAddressing,
    pub release_seconds: f64,
    pub params: ParamSet,
}

struct Effect {
    key: String,
    factory: Arc<dyn InstrumentFactory>,
    instance: Box<dyn Instrument>,
    controls: Vec<f32>,
    output: Vec<f32>,
}

pub struct PolyNode {
    instrument_key: String,
    factory: Arc<dyn InstrumentFactory>,
    voices: Vec<Voice>,
    effect: Option<Effect>,
    addressing: VoiceAddressing,
    release_seconds: f64,
    params: ParamSet,
    sample_rate: f64,

    /// The instrument's declared controls, in its own order.
    controls: Vec<ControlSpec>,
    /// Indices into `controls` that are exposed as parameters.
    user_controls: Vec<usize>,
    freq: Option<usize>,
    gain: Option<usize>,
    gate: Option<usize>,
    channels: usize,

    activations: u64,
    control_values: Vec<f32>,
    voice_out: Vec<f32>,
    mix: Vec<f32>,
}

impl fmt::Debug for PolyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolyNode")
            .field("instrument_key", &self.instrument_key)
            .field("effect_key", &self.effect_key())
            .field("num_voices", &self.voices.len())
            .field("addressing", &self.addressing)
            .field("release_seconds", &self.release_seconds)
            .finish_non_exhaustive()
    }
}

impl PolyNode {
    pub fn new(
        instrument_key: impl Into<String>,
        factory: Arc<dyn InstrumentFactory>,
        num_voices: usize,
        sample_rate: f64,
    ) -> Result<Self> {
        if num_voices == 0 {
            return Err(EngineError::InvalidVoiceCount);
        }

        let voices: Vec<Voice> = (0..num_voices)
            .map(|_| Voice::new(factory.create(sample_rate)))
            .collect();

        let mut node = Self {
            instrument_key: instrument_key.into(),
            factory,
            voices,
            effect: None,
            addressing: VoiceAddressing::Grouped,
            release_seconds: DEFAULT_RELEASE_SECONDS,
            params: ParamSet::default(),
            sample_rate,
            controls: Vec::new(),
            user_controls: Vec::new(),
            freq: None,
            gain: None,
            gate: None,
            channels: 0,
            activations: 0,
            control_values: Vec::new(),
            voice_out: Vec::new(),
            mix: Vec::new(),
        };
        node.read_layout();
        node.declare_params();
        Ok(node)
    }

    /// Rebuild a saved node, creating fresh instruments from `factory`.
    pub fn from_state(
        state: PolyState,
        factory: Arc<dyn InstrumentFactory>,
        effect: Option<Arc<dyn InstrumentFactory>>,
        sample_rate: f64,
    ) -> Result<Self> {
        let mut node = Self::new(state.instrument_key, factory, state.num_voices, sample_rate)?;
        node.release_seconds = state.release_seconds;
        node.addressing = state.addressing;
        if let (Some(key), Some(factory)) = (state.effect_key, effect) {
            node.set_effect(key, factory)?;
        }
        node.declare_params();
        node.params = state.params;
        Ok(node)
    }

    pub fn state(&self) -> PolyState {
        PolyState {
            instrument_key: self.instrument_key.clone(),
            effect_key: self.effect.as_ref().map(|e| e.key.clone()),
            num_voices: self.voices.len(),
            addressing: self.addressing,
            release_seconds: self.release_seconds,
            params: self.params.clone(),
        }
    }

    /// Read control layout and channel count from the first voice.
    fn read_layout(&mut self) {
        let instrument = self.voices[0].instrument_mut();
        self.controls = instrument.controls().to_vec();
        self.channels = instrument.num_outputs();

        let find = |name: &str| self.controls.iter().position(|c| c.path == name);
        self.freq = find(FREQ);
        self.gain = find(GAIN);
        self.gate = find(GATE);
        self.user_controls = (0..self.controls.len())
            .filter(|&i| !is_reserved(&self.controls[i].path))
            .collect();

        self.control_values = self.controls.iter().map(|c| c.default).collect();
        self.voice_out = vec![0.0; self.channels];
        self.mix = vec![0.0; self.channels];
    }

    fn declare_params(&mut self) {
        let mut specs = Vec::new();
        match self.addressing {
            VoiceAddressing::Grouped => {
                for &c in &self.user_controls {
                    let spec = &self.controls[c];
                    specs.push(spec.renamed(format!("voice/{}", spec.path)));
                }
            }
            VoiceAddressing::PerVoice => {
                for v in 0..self.voices.len() {
                    for &c in &self.user_controls {
                        let spec = &self.controls[c];
                        specs.push(spec.renamed(format!("voice{}/{}", v + 1, spec.path)));
                    }
                }
            }
        }
        if let Some(effect) = &self.effect {
            for spec in effect.instance.controls() {
                specs.push(spec.renamed(format!("effect/{}", spec.path)));
            }
        }
        self.params.redeclare(specs);
    }

    /// Parameter index of user control `u` for voice `v`.
    #[inline]
    fn voice_param(&self, v: usize, u: usize) -> usize {
        match self.addressing {
            VoiceAddressing::Grouped => u,
            VoiceAddressing::PerVoice => v * self.user_controls.len() + u,
        }
    }

    #[inline]
    fn effect_params_start(&self) -> usize {
        match self.addressing {
            VoiceAddressing::Grouped => self.user_controls.len(),
            VoiceAddressing::PerVoice => self.voices.len() * self.user_controls.len(),
        }
    }

    pub fn instrument_key(&self) -> &str {
        &self.instrument_key
    }

    pub fn effect_key(&self) -> Option<&str> {
        self.effect.as_ref().map(|e| e.key.as_str())
    }

    pub fn num_voices(&self) -> usize {
        self.voices.len()
    }

    /// Grow or shrink the pool. Voices that remain keep their instrument
    /// instance and, in per-voice mode, their parameters.
    pub fn set_num_voices(&mut self, num_voices: usize) -> Result<()> {
        if num_voices == 0 {
            return Err(EngineError::InvalidVoiceCount);
        }
        self.voices.truncate(num_voices);
        while self.voices.len() < num_voices {
            self.voices.push(Voice::new(self.factory.create(self.sample_rate)));
        }
        self.declare_params();
        Ok(())
    }

    pub fn addressing(&self) -> VoiceAddressing {
        self.addressing
    }

    pub fn set_addressing(&mut self, addressing: VoiceAddressing) {
        self.addressing = addressing;
        self.declare_params();
    }

    pub fn release_seconds(&self) -> f64 {
        self.release_seconds
    }

    pub fn set_release_seconds(&mut self, seconds: f64) -> Result<()> {
        if !(seconds.is_finite() && seconds >= 0.0) {
            return Err(EngineError::InvalidDuration { duration: seconds });
        }
        self.release_seconds = seconds;
        Ok(())
    }

    /// Route the mixed voices through a shared post-stage. The post-stage
    /// must take as many inputs as the instrument has outputs.
    pub fn set_effect(
        &mut self,
        key: impl Into<String>,
        factory: Arc<dyn InstrumentFactory>,
    ) -> Result<()> {
        let key = key.into();
        let instance = factory.create(self.sample_rate);
        if instance.num_inputs() != self.channels {
            return Err(EngineError::ChannelMismatch {
                node: key,
                expected: self.channels,
                actual: instance.num_inputs(),
            });
        }
        let controls = instance.controls().iter().map(|c| c.default).collect();
        let output = vec![0.0; instance.num_outputs()];
        self.effect = Some(Effect {
            key,
            factory,
            instance,
            controls,
            output,
        });
        self.declare_params();
        Ok(())
    }

    pub fn clear_effect(&mut self) {
        self.effect = None;
        self.declare_params();
    }

    /// Voices currently bound to a note (active or releasing).
    pub fn sounding_voices(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_idle()).count()
    }

    fn handle(&mut self, event: MidiEvent) {
        match event {
            MidiEvent::NoteOn { key, velocity } if velocity > 0 => {
                if let Some(index) = choose_voice(&self.voices) {
                    let age = self.activations;
                    self.activations += 1;
                    self.voices[index].start(key, velocity, age);
                }
            }
            MidiEvent::NoteOn { key, .. } | MidiEvent::NoteOff { key } => {
                if let Some(index) = find_voice(&self.voices, key) {
                    let samples = round_half_up(self.release_seconds * self.sample_rate);
                    self.voices[index].release(samples);
                }
            }
        }
    }

    fn render_frame(&mut self, n: usize, outputs: &mut [Vec<f32>]) {
        self.mix.fill(0.0);

        for v in 0..self.voices.len() {
            if self.voices[v].is_idle() {
                continue;
            }

            for (u, &c) in self.user_controls.iter().enumerate() {
                self.control_values[c] = self.params.at(self.voice_param(v, u), n);
            }
            let voice = &mut self.voices[v];
            if let Some(i) = self.freq {
                self.control_values[i] = midi_note_to_freq(voice.note());
            }
            if let Some(i) = self.gain {
                self.control_values[i] = voice.velocity() as f32 / 127.0;
            }
            if let Some(i) = self.gate {
                self.control_values[i] = match voice.state() {
                    VoiceState::Active => 1.0,
                    _ => 0.0,
                };
            }

            voice
                .instrument_mut()
                .tick(&self.control_values, &[], &mut self.voice_out);
            voice.advance();

            for (m, s) in self.mix.iter_mut().zip(&self.voice_out) {
                *m += *s;
            }
        }

        let effect_params = self.effect_params_start();
        match &mut self.effect {
            Some(effect) => {
                for (i, value) in effect.controls.iter_mut().enumerate() {
                    *value = self.params.at(effect_params + i, n);
                }
                effect
                    .instance
                    .tick(&effect.controls, &self.mix, &mut effect.output);
                for (out, s) in outputs.iter_mut().zip(&effect.output) {
                    out[n] = *s;
                }
            }
            None => {
                for (out, s) in outputs.iter_mut().zip(&self.mix) {
                    out[n] = *s;
                }
            }
        }
    }
}

impl Processor for PolyNode {
    fn kind(&self) -> &'static str {
        "poly"
    }

    fn input_layout(&self) -> InputLayout {
        InputLayout::None
    }

    fn configure(&mut self, _input_channels: usize, sample_rate: f64) -> Result<()> {
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            for voice in &mut self.voices {
                voice.replace_instrument(self.factory.create(sample_rate));
            }
            if let Some(effect) = &mut self.effect {
                effect.instance = effect.factory.create(sample_rate);
            }
        }
        Ok(())
    }

    fn num_outputs(&self) -> usize {
        match &self.effect {
            Some(effect) => effect.instance.num_outputs(),
            None => self.channels,
        }
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        if let Some(effect) = &mut self.effect {
            effect.instance.reset();
        }
        self.activations = 0;
    }

    fn process(
        &mut self,
        ctx: &BlockCtx,
        _inputs: &[&[f32]],
        outputs: &mut [Vec<f32>],
        events: &[BlockEvent],
    ) -> Result<()> {
        let mut pending = events.iter().peekable();
        for n in 0..ctx.len {
            while let Some(event) = pending.next_if(|e| e.offset <= n) {
                self.handle(event.event);
            }
            self.render_frame(n, outputs);
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    fn snapshot(&self) -> Option<ProcessorState> {
        Some(ProcessorState::Poly(self.state()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TempoMap;
    use crate::voices::SineVoice;

    const SR: f64 = 1_000.0;

    fn sine_factory() -> Arc<dyn InstrumentFactory> {
        Arc::new(|sr: f64| -> Box<dyn Instrument> { Box::new(SineVoice::new(sr)) })
    }

    fn run(node: &mut PolyNode, tempo: &TempoMap, len: usize, events: &[BlockEvent]) -> Vec<Vec<f32>> {
        node.params_mut().prepare_block(0, len, tempo);
        let ctx = BlockCtx {
            sample_rate: SR,
            start: 0,
            len,
            tempo,
        };
        let mut outputs = vec![vec![0.0; len]; node.num_outputs()];
        node.process(&ctx, &[], &mut outputs, events).unwrap();
        outputs
    }

    fn on(offset: usize, key: u8) -> BlockEvent {
        BlockEvent {
            offset,
            event: MidiEvent::NoteOn { key, velocity: 100 },
        }
    }

    fn off(offset: usize, key: u8) -> BlockEvent {
        BlockEvent {
            offset,
            event: MidiEvent::NoteOff { key },
        }
    }

    #[test]
    fn params_follow_addressing_mode() {
        let mut node = PolyNode::new("sine", sine_factory(), 2, SR).unwrap();
        let paths: Vec<&str> = node.params().paths().collect();
        assert!(paths.contains(&"voice/attack"));
        assert!(!paths.iter().any(|p| p.ends_with("/freq")));

        node.set_addressing(VoiceAddressing::PerVoice);
        assert!(node.params().resolve(&"voice2/attack".into()).is_some());
        assert!(node.params().resolve(&"voice3/attack".into()).is_none());
        assert!(node.params().resolve(&"voice/attack".into()).is_none());
    }

    #[test]
    fn pool_never_exceeds_voice_count() {
        let tempo = TempoMap::constant(120.0, SR).unwrap();
        let mut node = PolyNode::new("sine", sine_factory(), 2, SR).unwrap();
        node.reset();

        let events = [on(0, 60), on(1, 62), on(2, 64), on(3, 65)];
        run(&mut node, &tempo, 10, &events);
        assert_eq!(node.sounding_voices(), 2);
    }

    #[test]
    fn voices_recycle_after_release() {
        let tempo = TempoMap::constant(120.0, SR).unwrap();
        let mut node = PolyNode::new("sine", sine_factory(), 1, SR).unwrap();
        node.set_release_seconds(0.01).unwrap();
        node.reset();

        run(&mut node, &tempo, 20, &[on(0, 60), off(5, 60)]);
        assert_eq!(node.sounding_voices(), 0, "10 ms release at 1 kHz is 10 frames");
    }

    #[test]
    fn set_num_voices_keeps_retained_params() {
        let mut node = PolyNode::new("sine", sine_factory(), 3, SR).unwrap();
        node.set_addressing(VoiceAddressing::PerVoice);
        let index = node.params().resolve(&"voice2/sustain".into()).unwrap();
        node.params_mut().set_value(index, 0.25);

        node.set_num_voices(5).unwrap();
        node.set_num_voices(2).unwrap();
        let index = node.params().resolve(&"voice2/sustain".into()).unwrap();
        assert_eq!(node.params().value(index), 0.25);
        assert!(node.params().resolve(&"voice3/sustain".into()).is_none());
        assert_eq!(node.set_num_voices(0), Err(EngineError::InvalidVoiceCount));
    }

    #[test]
    fn grouped_and_per_voice_render_identically() {
        let tempo = TempoMap::constant(120.0, SR).unwrap();
        let events = [on(0, 60), on(3, 67), off(40, 60), on(50, 72), off(90, 67)];

        let mut grouped = PolyNode::new("sine", sine_factory(), 4, SR).unwrap();
        grouped.reset();
        let a = run(&mut grouped, &tempo, 200, &events);

        let mut per_voice = PolyNode::new("sine", sine_factory(), 4, SR).unwrap();
        per_voice.set_addressing(VoiceAddressing::PerVoice);
        per_voice.reset();
        let b = run(&mut per_voice, &tempo, 200, &events);

        assert_eq!(a, b);
        assert!(a[0].iter().any(|&s| s != 0.0));
    }
}
