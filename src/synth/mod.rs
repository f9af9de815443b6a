// Purpose: Voice management, polyphony, note handling
// This layer sits above the graph engine and plays notes on instruments

pub mod allocator;
pub mod instrument;
pub mod poly;
pub mod voice;

pub use instrument::{ControlSpec, Instrument, InstrumentFactory, InstrumentRegistry};
pub use poly::{PolyNode, PolyState, VoiceAddressing};
pub use voice::{Voice, VoiceState};
