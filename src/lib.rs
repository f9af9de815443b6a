//! Offline, sample-accurate rendering of audio processor graphs.
//!
//! Build nodes on a [`RenderEngine`], schedule notes and automation against
//! a tempo map, load a graph description and render to memory.
//!
//! ```ignore
//! use saavy_render::{voices, EngineConfig, GraphDescription, Note, RenderEngine, TimeUnit};
//!
//! let mut engine = RenderEngine::new(EngineConfig::default())?;
//! voices::register_builtins(engine.registry_mut());
//! engine.make_poly("keys", voices::SINE, 8)?;
//! engine.add_note("keys", Note::new(60, 100, 0.0, 1.0), TimeUnit::Beats)?;
//! engine.load_graph(GraphDescription::new().node("keys", &[]))?;
//! engine.render(4.0, TimeUnit::Beats)?;
//! let audio = engine.get_audio(None)?;
//! ```

pub mod dsp; // Sample-level DSP primitives
pub mod engine; // Render engine, scheduling, automation, persistence
pub mod error;
pub mod graph; // Processor nodes
pub mod io; // Source audio and note events
pub mod synth; // Voice management and polyphony
pub mod timing; // Tempo maps and time units
pub mod voices; // Built-in instruments

pub use engine::automation::{AutomationCurve, ParamId, ParamSpec};
pub use engine::{EngineConfig, EngineState, GraphDescription, RenderEngine};
pub use error::{EngineError, ErrorKind, Result};
pub use graph::{AddNode, GainNode, OscillatorNode, PlaybackNode, Processor, WarpNode};
pub use io::{MidiEvent, Note, SourceBuffer};
pub use synth::{Instrument, InstrumentFactory, InstrumentRegistry, PolyNode, VoiceAddressing};
pub use timing::{TempoInterpolation, TempoMap, TimeUnit};

/// Largest supported processing block, in frames.
pub const MAX_BLOCK_SIZE: usize = 2048;

/// Shortest envelope stage, in seconds.
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
