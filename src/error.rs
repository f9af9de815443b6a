use std::fmt;

/// Broad category of an [`EngineError`].
///
/// Configuration errors are raised before any audio is produced (topology,
/// tempo, markers). Resource errors name something that could not be found.
/// Render errors come from asking an engine to render something it can't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resource,
    Render,
}

/// Errors that can occur while configuring or rendering an engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A BPM value was zero, negative, or not finite
    InvalidTempo { index: usize, bpm: f64 },
    /// A tempo curve had no values
    EmptyTempoCurve,
    /// Tick resolution must be at least one pulse per quarter note
    InvalidPpqn,
    /// Sample rate must be positive and finite
    InvalidSampleRate { sample_rate: f64 },
    /// Block size must be between 1 and MAX_BLOCK_SIZE
    InvalidBlockSize { block_size: usize },
    /// Render or note duration was not a positive finite number
    InvalidDuration { duration: f64 },
    /// A graph description listed the same node twice
    DuplicateNode { name: String },
    /// The graph contains a cycle through this node
    CyclicGraph { node: String },
    /// A producer exists but is not part of the graph description
    UndeclaredProducer { consumer: String, producer: String },
    /// A node rejected the channel layout produced by its inputs
    ChannelMismatch {
        node: String,
        expected: usize,
        actual: usize,
    },
    /// Warp markers must strictly increase in both coordinates
    NonMonotonicWarpMarkers { index: usize },
    /// At least two warp markers are needed to define a segment
    TooFewWarpMarkers { count: usize },
    /// Loop or start/end markers describe an empty or inverted region
    InvalidRegion { start: f64, end: f64 },
    /// Clip placements overlap or are inverted
    InvalidClip { index: usize },
    /// Interpolation order outside the supported range
    InvalidInterpolationOrder { order: usize },
    /// Warp time ratio must be positive and finite
    InvalidTimeRatio { ratio: f64 },
    /// A node was asked for zero output channels
    InvalidChannelCount { channels: usize },
    /// Note pitch or velocity outside 0-127
    InvalidNote { pitch: u8, velocity: u8 },
    /// Source audio had no channels, ragged channels, or a bad sample rate
    InvalidSource { reason: String },
    /// Voice count must be at least one
    InvalidVoiceCount,
    /// An automation curve had no values
    EmptyAutomation { param: String },
    /// No node with this name has been created
    UnknownNode { name: String },
    /// A graph edge names a producer that does not exist
    UnknownProducer { consumer: String, producer: String },
    /// A parameter identifier did not resolve on this node
    UnknownParameter { node: String, param: String },
    /// No instrument factory is registered under this key
    MissingInstrument { key: String },
    /// The node exists but is not of the requested type
    WrongNodeType { name: String },
    /// Render was requested without any loaded graph
    EmptyGraph,
    /// Render was requested after a topology change without reloading
    GraphNotLoaded,
    /// Audio was requested for a node that was not recorded
    NotRecorded { name: String },
    /// Encoding or decoding an engine snapshot failed
    Persistence { reason: String },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownNode { .. }
            | EngineError::UnknownProducer { .. }
            | EngineError::UnknownParameter { .. }
            | EngineError::MissingInstrument { .. }
            | EngineError::WrongNodeType { .. }
            | EngineError::NotRecorded { .. } => ErrorKind::Resource,
            EngineError::EmptyGraph | EngineError::GraphNotLoaded => ErrorKind::Render,
            _ => ErrorKind::Configuration,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidTempo { index, bpm } => {
                write!(f, "BPM must be positive: got {} at tick {}", bpm, index)
            }
            EngineError::EmptyTempoCurve => write!(f, "tempo curve has no values"),
            EngineError::InvalidPpqn => write!(f, "PPQN must be greater than zero"),
            EngineError::InvalidSampleRate { sample_rate } => {
                write!(f, "sample rate must be positive: got {}", sample_rate)
            }
            EngineError::InvalidBlockSize { block_size } => {
                write!(f, "block size {} is out of range", block_size)
            }
            EngineError::InvalidDuration { duration } => {
                write!(f, "duration must be greater than zero: got {}", duration)
            }
            EngineError::DuplicateNode { name } => {
                write!(f, "node '{}' appears more than once in the graph", name)
            }
            EngineError::CyclicGraph { node } => {
                write!(f, "graph contains a cycle through node '{}'", node)
            }
            EngineError::UndeclaredProducer { consumer, producer } => write!(
                f,
                "'{}' takes input from '{}', which is not part of the graph",
                consumer, producer
            ),
            EngineError::ChannelMismatch {
                node,
                expected,
                actual,
            } => write!(
                f,
                "node '{}' expects {} input channels, but its producers supply {}",
                node, expected, actual
            ),
            EngineError::NonMonotonicWarpMarkers { index } => write!(
                f,
                "warp markers must be strictly increasing (marker {} is not)",
                index
            ),
            EngineError::TooFewWarpMarkers { count } => {
                write!(f, "need at least two warp markers, got {}", count)
            }
            EngineError::InvalidRegion { start, end } => {
                write!(f, "region [{}, {}) is empty or inverted", start, end)
            }
            EngineError::InvalidClip { index } => {
                write!(f, "clip placement {} is inverted or overlaps its neighbour", index)
            }
            EngineError::InvalidInterpolationOrder { order } => {
                write!(f, "interpolation order {} is not supported", order)
            }
            EngineError::InvalidTimeRatio { ratio } => {
                write!(f, "time ratio must be positive: got {}", ratio)
            }
            EngineError::InvalidChannelCount { channels } => {
                write!(f, "channel count must be at least one: got {}", channels)
            }
            EngineError::InvalidNote { pitch, velocity } => write!(
                f,
                "note pitch and velocity must be 0-127: got pitch {}, velocity {}",
                pitch, velocity
            ),
            EngineError::InvalidSource { reason } => write!(f, "invalid source audio: {}", reason),
            EngineError::InvalidVoiceCount => write!(f, "voice count must be at least one"),
            EngineError::EmptyAutomation { param } => {
                write!(f, "automation for '{}' has no values", param)
            }
            EngineError::UnknownNode { name } => write!(f, "no node named '{}'", name),
            EngineError::UnknownProducer { consumer, producer } => write!(
                f,
                "'{}' takes input from unknown node '{}'",
                consumer, producer
            ),
            EngineError::UnknownParameter { node, param } => {
                write!(f, "node '{}' has no parameter '{}'", node, param)
            }
            EngineError::MissingInstrument { key } => {
                write!(f, "no instrument registered under '{}'", key)
            }
            EngineError::WrongNodeType { name } => {
                write!(f, "node '{}' is not of the requested type", name)
            }
            EngineError::EmptyGraph => write!(f, "cannot render an empty graph"),
            EngineError::GraphNotLoaded => {
                write!(f, "graph changed since it was loaded; call load_graph first")
            }
            EngineError::NotRecorded { name } => {
                write!(f, "node '{}' was not recorded in the last render", name)
            }
            EngineError::Persistence { reason } => write!(f, "snapshot error: {}", reason),
        }
    }
}

impl std::error::Error for EngineError {}

pub type Result<T> = std::result::Result<T, EngineError>;
