use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::timing::TempoMap;

/*
Parameter Automation
====================

Every node owns a ParamSet: one entry per parameter, holding either a fixed
value or an automation curve. Before a block is processed the engine asks the
set to realize every parameter into a per-sample buffer, so node code only
ever reads `block(i)[frame]` and doesn't care where the value came from.

Curves come in two shapes:

  PerSample   one value per output sample, indexed by absolute sample
  Ticks       one value per tick at a caller-chosen PPQN, indexed by
              musical position: beat(sample) * ppqn

Tick curves are linearly interpolated between adjacent ticks:

    pos  = beat * ppqn
    v    = values[i] + (values[i+1] - values[i]) * (pos - i)     i = floor(pos)

Both shapes hold their last value forever once the render runs past the end.

Realizing values at every sample, rather than once per block, is what makes
rendered output independent of the block size: frame n sees the same value
whether it is the first sample of a block or the hundredth.
*/

/// Identifies a parameter on a node, either by position or by its path.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamId {
    Index(usize),
    Path(String),
}

impl From<usize> for ParamId {
    fn from(index: usize) -> Self {
        ParamId::Index(index)
    }
}

impl From<&str> for ParamId {
    fn from(path: &str) -> Self {
        ParamId::Path(path.to_string())
    }
}

impl From<String> for ParamId {
    fn from(path: String) -> Self {
        ParamId::Path(path)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamId::Index(index) => write!(f, "#{}", index),
            ParamId::Path(path) => f.write_str(path),
        }
    }
}

/// Declaration of one parameter: hierarchical path, default, and range.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub path: String,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

impl ParamSpec {
    pub fn new(path: impl Into<String>, default: f32, min: f32, max: f32) -> Self {
        Self {
            path: path.into(),
            default,
            min,
            max,
        }
    }

    /// Same range and default under a different path.
    pub fn renamed(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum AutomationCurve {
    /// One value per output sample.
    PerSample(Vec<f32>),
    /// One value per tick at `ppqn` ticks per beat.
    Ticks { ppqn: u32, values: Vec<f32> },
}

impl AutomationCurve {
    #[inline]
    fn values(&self) -> &[f32] {
        match self {
            AutomationCurve::PerSample(values) => values,
            AutomationCurve::Ticks { values, .. } => values,
        }
    }

    /// Value at an absolute output sample.
    pub fn value_at(&self, sample: u64, tempo: &TempoMap) -> f32 {
        match self {
            AutomationCurve::PerSample(values) => {
                let index = (sample as usize).min(values.len() - 1);
                values[index]
            }
            AutomationCurve::Ticks { ppqn, values } => {
                let pos = tempo.beat_at_sample(sample as f64) * *ppqn as f64;
                if pos <= 0.0 {
                    return values[0];
                }
                let i = pos.floor() as usize;
                if i + 1 >= values.len() {
                    return values[values.len() - 1];
                }
                let frac = (pos - i as f64) as f32;
                values[i] + (values[i + 1] - values[i]) * frac
            }
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
struct Param {
    spec: ParamSpec,
    value: f32,
    curve: Option<AutomationCurve>,
    #[cfg_attr(feature = "serde", serde(skip))]
    block: Vec<f32>,
}

impl Param {
    fn new(spec: ParamSpec) -> Self {
        Self {
            value: spec.default,
            spec,
            curve: None,
            block: Vec::new(),
        }
    }
}

/// The parameters of one node, with their automation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    params: Vec<Param>,
}

impl ParamSet {
    pub fn new(specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        Self {
            params: specs.into_iter().map(Param::new).collect(),
        }
    }

    /// Replace the declared parameters, keeping value and curve of every
    /// parameter whose path survives.
    pub fn redeclare(&mut self, specs: impl IntoIterator<Item = ParamSpec>) {
        let mut old = std::mem::take(&mut self.params);
        self.params = specs
            .into_iter()
            .map(|spec| match old.iter().position(|p| p.spec.path == spec.path) {
                Some(i) => {
                    let mut kept = old.swap_remove(i);
                    kept.spec = spec;
                    kept
                }
                None => Param::new(spec),
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn resolve(&self, id: &ParamId) -> Option<usize> {
        match id {
            ParamId::Index(index) if *index < self.params.len() => Some(*index),
            ParamId::Index(_) => None,
            ParamId::Path(path) => self.params.iter().position(|p| &p.spec.path == path),
        }
    }

    pub fn spec(&self, index: usize) -> &ParamSpec {
        &self.params[index].spec
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.spec.path.as_str())
    }

    /// The fixed value, ignoring any curve.
    pub fn value(&self, index: usize) -> f32 {
        self.params[index].value
    }

    /// Set a fixed value and drop any curve on this parameter.
    pub fn set_value(&mut self, index: usize, value: f32) {
        let param = &mut self.params[index];
        param.value = param.spec.clamp(value);
        param.curve = None;
    }

    pub fn set_curve(&mut self, index: usize, curve: AutomationCurve) -> Result<()> {
        let param = &mut self.params[index];
        if curve.values().is_empty() {
            return Err(EngineError::EmptyAutomation {
                param: param.spec.path.clone(),
            });
        }
        if let AutomationCurve::Ticks { ppqn: 0, .. } = curve {
            return Err(EngineError::InvalidPpqn);
        }
        param.curve = Some(curve);
        Ok(())
    }

    pub fn curve(&self, index: usize) -> Option<&AutomationCurve> {
        self.params[index].curve.as_ref()
    }

    pub fn is_automated(&self, index: usize) -> bool {
        self.params[index].curve.is_some()
    }

    /// Realize every parameter for samples `start .. start + len`.
    pub fn prepare_block(&mut self, start: u64, len: usize, tempo: &TempoMap) {
        for param in &mut self.params {
            param.block.resize(len, 0.0);
            match &param.curve {
                None => param.block.fill(param.value),
                Some(curve) => {
                    for (n, slot) in param.block.iter_mut().enumerate() {
                        *slot = param.spec.clamp(curve.value_at(start + n as u64, tempo));
                    }
                }
            }
        }
    }

    /// Realized values from the last `prepare_block` call.
    pub fn block(&self, index: usize) -> &[f32] {
        &self.params[index].block
    }

    #[inline]
    pub fn at(&self, index: usize, frame: usize) -> f32 {
        self.params[index].block[frame]
    }
}
