//! Engine snapshots.
//!
//! A snapshot captures configuration, tempo, every node's settings and
//! parameters, the scheduled notes, and the loaded graph. Poly nodes are
//! stored by instrument key and rebuilt from a registry on restore; source
//! audio is stored inline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::config::EngineConfig;
use crate::engine::graph::GraphDescription;
use crate::engine::scheduler::Scheduler;
use crate::engine::{EngineState, NodeSlot, RenderEngine};
use crate::error::{EngineError, Result};
use crate::graph::node::Processor;
use crate::graph::{AddNode, GainNode, OscillatorNode, PlaybackNode, WarpNode};
use crate::synth::instrument::InstrumentRegistry;
use crate::synth::poly::{PolyNode, PolyState};
use crate::timing::TempoMap;

const SNAPSHOT_VERSION: u32 = 1;

/// Serializable form of each built-in processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProcessorState {
    Oscillator(OscillatorNode),
    Playback(PlaybackNode),
    Warp(WarpNode),
    Add(AddNode),
    Gain(GainNode),
    Poly(PolyState),
}

impl ProcessorState {
    fn into_processor(
        self,
        registry: &InstrumentRegistry,
        sample_rate: f64,
    ) -> Result<Box<dyn Processor>> {
        Ok(match self {
            ProcessorState::Oscillator(node) => Box::new(node),
            ProcessorState::Playback(node) => Box::new(node),
            ProcessorState::Warp(node) => Box::new(node),
            ProcessorState::Add(node) => Box::new(node),
            ProcessorState::Gain(node) => Box::new(node),
            ProcessorState::Poly(state) => {
                let factory = registry.get(&state.instrument_key)?;
                let effect = state
                    .effect_key
                    .as_deref()
                    .map(|key| registry.get(key))
                    .transpose()?;
                Box::new(PolyNode::from_state(state, factory, effect, sample_rate)?)
            }
        })
    }
}

#[derive(Serialize, Deserialize)]
struct NodeSnapshot {
    name: String,
    record: bool,
    record_automation: bool,
    state: ProcessorState,
}

#[derive(Serialize, Deserialize)]
struct EngineSnapshot {
    version: u32,
    config: EngineConfig,
    tempo: TempoMap,
    nodes: Vec<NodeSnapshot>,
    scheduler: Scheduler,
    graph: Option<GraphDescription>,
}

impl RenderEngine {
    /// Encode the engine's setup. Rendered audio is not included.
    ///
    /// Processors without a serializable form are left out with a warning.
    pub fn save(&self) -> Result<Vec<u8>> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (name, slot) in &self.nodes {
            match slot.processor.snapshot() {
                Some(state) => nodes.push(NodeSnapshot {
                    name: name.clone(),
                    record: slot.record,
                    record_automation: slot.record_automation,
                    state,
                }),
                None => warn!(node = name.as_str(), "node can't be saved, skipping"),
            }
        }

        let snapshot = EngineSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config,
            tempo: self.tempo.clone(),
            nodes,
            scheduler: self.scheduler.clone(),
            graph: self.graph().cloned(),
        };
        let bytes = bincode::serialize(&snapshot).map_err(|e| EngineError::Persistence {
            reason: e.to_string(),
        })?;
        debug!(bytes = bytes.len(), "saved engine");
        Ok(bytes)
    }

    /// Rebuild an engine from `save` output. Poly nodes look their
    /// instruments up in `registry`.
    pub fn restore(bytes: &[u8], registry: InstrumentRegistry) -> Result<Self> {
        let snapshot: EngineSnapshot =
            bincode::deserialize(bytes).map_err(|e| EngineError::Persistence {
                reason: e.to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EngineError::Persistence {
                reason: format!("unsupported snapshot version {}", snapshot.version),
            });
        }

        let mut engine = RenderEngine::with_registry(snapshot.config, registry)?;
        engine.tempo = snapshot.tempo;
        engine.scheduler = snapshot.scheduler;

        let mut nodes = BTreeMap::new();
        for node in snapshot.nodes {
            let processor = node
                .state
                .into_processor(&engine.registry, engine.config.sample_rate)?;
            nodes.insert(
                node.name,
                NodeSlot {
                    processor,
                    record: node.record,
                    record_automation: node.record_automation,
                },
            );
        }
        engine.nodes = nodes;
        engine.state = EngineState::Unloaded;

        if let Some(graph) = snapshot.graph {
            engine.load_graph(graph)?;
        }
        debug!(nodes = engine.nodes.len(), "restored engine");
        Ok(engine)
    }
}
