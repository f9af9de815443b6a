// Purpose - note data exchanged with the engine, PCM sources

pub mod midi;
pub mod source;

pub use midi::{MidiEvent, Note};
pub use source::SourceBuffer;
