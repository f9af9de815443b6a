//! Processors that can be placed in a render graph.
//!
//! Every node implements [`node::Processor`]. The engine owns them by name and
//! wires them together from a graph description at load time.

/// Sum producers channel-group-wise with per-input gain.
pub mod add;
/// Automatable gain on any number of channels.
pub mod amplify;
/// Core traits shared by all graph nodes.
pub mod node;
/// Sine source.
pub mod oscillator;
/// Sample-exact playback of a source buffer.
pub mod playback;
/// Time-stretched, tempo-following playback.
pub mod warp;

pub use add::AddNode;
pub use amplify::GainNode;
pub use node::{BlockCtx, InputLayout, Processor};
pub use oscillator::OscillatorNode;
pub use playback::PlaybackNode;
pub use warp::{ClipPlacement, WarpMarker, WarpNode};
