//! Built-in instruments for poly nodes.
//!
//! # Example
//!
//! ```ignore
//! use saavy_render::voices;
//!
//! let mut registry = InstrumentRegistry::new();
//! voices::register_builtins(&mut registry);
//! engine.make_poly("keys", "sine", 8)?;
//! ```

mod drive;
mod sine;

pub use drive::Drive;
pub use sine::SineVoice;

use crate::synth::instrument::{Instrument, InstrumentRegistry};

/// Registry key of [`SineVoice`].
pub const SINE: &str = "sine";
/// Registry key of a stereo [`Drive`].
pub const DRIVE: &str = "drive";

/// Register every built-in instrument under its key.
pub fn register_builtins(registry: &mut InstrumentRegistry) {
    registry.register(SINE, |sr: f64| -> Box<dyn Instrument> {
        Box::new(SineVoice::new(sr))
    });
    registry.register(DRIVE, |_sr: f64| -> Box<dyn Instrument> {
        Box::new(Drive::new(2))
    });
}
