use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::engine::automation::ParamSpec;
use crate::error::{EngineError, Result};

/// Declaration of one instrument control: name, default and range.
///
/// Same shape as a node parameter; the poly node turns each control into a
/// parameter by prefixing its name (`voice/cutoff`, `voice3/cutoff`, ...).
pub type ControlSpec = ParamSpec;

/// Control names the voice manager drives itself.
pub const FREQ: &str = "freq";
pub const GAIN: &str = "gain";
pub const GATE: &str = "gate";

pub fn is_reserved(control: &str) -> bool {
    matches!(control, FREQ | GAIN | GATE)
}

/// A sound source or processor that renders one frame at a time from a
/// vector of control values.
///
/// This is all the engine needs from a synthesis back end: it doesn't care
/// how the sound is made, only which controls exist and how many channels
/// come in and out. Controls named `freq`, `gain` and `gate` are set per note
/// by the voice manager; the rest are exposed as automatable parameters.
pub trait Instrument: Send {
    fn controls(&self) -> &[ControlSpec];

    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize;

    /// Render one frame. `controls` follows the order of `controls()`.
    fn tick(&mut self, controls: &[f32], input: &[f32], output: &mut [f32]);

    /// Silence all internal state, as if freshly created.
    fn reset(&mut self);
}

/// Creates instrument instances, one per voice.
///
/// This is the "instrument design" layer: configure the sound once and the
/// voice manager asks for as many identical copies as it has voices.
pub trait InstrumentFactory: Send + Sync {
    fn create(&self, sample_rate: f64) -> Box<dyn Instrument>;
}

impl<F> InstrumentFactory for F
where
    F: Fn(f64) -> Box<dyn Instrument> + Send + Sync,
{
    fn create(&self, sample_rate: f64) -> Box<dyn Instrument> {
        self(sample_rate)
    }
}

/// Instrument factories by key. Poly nodes name their instrument by key, so
/// restoring a saved engine only needs the same registry.
#[derive(Clone, Default)]
pub struct InstrumentRegistry {
    factories: BTreeMap<String, Arc<dyn InstrumentFactory>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, factory: impl InstrumentFactory + 'static) {
        self.factories.insert(key.into(), Arc::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn InstrumentFactory>> {
        self.factories
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::MissingInstrument {
                key: key.to_string(),
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for InstrumentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
