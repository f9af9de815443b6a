//! The render engine: owns the nodes, the tempo map and the note queues, and
//! runs the graph one block at a time.

pub mod automation;
pub mod config;
pub mod graph;
#[cfg(feature = "serde")]
pub mod persist;
pub mod scheduler;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, debug_span, warn};

use crate::error::{EngineError, Result};
use crate::graph::node::{BlockCtx, Processor};
use crate::graph::{AddNode, GainNode, OscillatorNode, PlaybackNode, WarpNode};
use crate::io::midi::Note;
use crate::io::source::SourceBuffer;
use crate::synth::instrument::{InstrumentFactory, InstrumentRegistry};
use crate::synth::poly::PolyNode;
use crate::timing::{round_half_up, TempoMap, TimeUnit};

use self::automation::{AutomationCurve, ParamId};
use self::graph::{plan, ExecutionPlan};
use self::scheduler::{BlockEvent, Scheduler};

pub use self::config::EngineConfig;
pub use self::graph::{GraphDescription, GraphStep};

/*
Render Engine
=============

Life cycle:

   Unloaded --load_graph--> Loaded --render--> Rendering --> Rendered
      ^                        ^                                 |
      |                        +------------ render -------------+
      +---- add / replace / remove a node (from any state)

Adding, replacing or removing a node invalidates the loaded graph; parameters,
notes, automation and tempo can change in any state without a reload.

Rendering
---------
`render` resets every node to t = 0, then walks the timeline in blocks of
`block_size` frames (the last block may be shorter). For each block, nodes
run in topological order:

   1. realize the node's parameters for every frame of the block
   2. capture them, if the node records automation
   3. hand over the note events due in the block
   4. process, reading the producers' buffers of this same block
   5. append the output to the node's recording, if recorded

Only one block per node is held in memory besides recordings. Since
parameters and events are resolved per frame, the block size changes how the
work is chopped up but never what comes out.

The last node of the description is the graph output and is always recorded.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unloaded,
    Loaded,
    Rendering,
    Rendered,
}

struct NodeSlot {
    processor: Box<dyn Processor>,
    record: bool,
    record_automation: bool,
}

impl NodeSlot {
    fn new(processor: Box<dyn Processor>) -> Self {
        Self {
            processor,
            record: false,
            record_automation: false,
        }
    }
}

/// A loaded graph: the description plus the checked plan and channel counts.
struct LoadedGraph {
    description: GraphDescription,
    plan: ExecutionPlan,
    outputs: Vec<usize>,
}

pub struct RenderEngine {
    config: EngineConfig,
    tempo: TempoMap,
    nodes: BTreeMap<String, NodeSlot>,
    scheduler: Scheduler,
    registry: InstrumentRegistry,
    graph: Option<LoadedGraph>,
    /// Last description passed to a successful `load_graph`.
    description: Option<GraphDescription>,
    state: EngineState,
    recordings: BTreeMap<String, Vec<Vec<f32>>>,
    automation: BTreeMap<String, BTreeMap<String, Vec<f32>>>,
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("graph", &self.graph())
            .finish_non_exhaustive()
    }
}

impl RenderEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_registry(config, InstrumentRegistry::new())
    }

    pub fn with_registry(config: EngineConfig, registry: InstrumentRegistry) -> Result<Self> {
        config.validate()?;
        let tempo = TempoMap::from_curve(
            vec![config.bpm],
            crate::timing::DEFAULT_PPQN,
            config.tempo_interpolation,
            config.sample_rate,
        )?;
        Ok(Self {
            config,
            tempo,
            nodes: BTreeMap::new(),
            scheduler: Scheduler::new(),
            registry,
            graph: None,
            description: None,
            state: EngineState::Unloaded,
            recordings: BTreeMap::new(),
            automation: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// The description of the currently loaded graph.
    pub fn graph(&self) -> Option<&GraphDescription> {
        self.graph.as_ref().map(|g| &g.description)
    }

    // ---- Tempo ----------------------------------------------------------

    /// Replace the tempo with a constant BPM. Queued notes given in beats
    /// move to their new sample positions.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        self.set_tempo(TempoMap::from_curve(
            vec![bpm],
            self.tempo.ppqn(),
            self.config.tempo_interpolation,
            self.config.sample_rate,
        )?);
        Ok(())
    }

    /// Replace the tempo with a curve of one BPM per tick at `ppqn`.
    pub fn set_bpm_curve(&mut self, bpms: Vec<f64>, ppqn: u32) -> Result<()> {
        self.set_tempo(TempoMap::from_curve(
            bpms,
            ppqn,
            self.config.tempo_interpolation,
            self.config.sample_rate,
        )?);
        Ok(())
    }

    fn set_tempo(&mut self, tempo: TempoMap) {
        self.tempo = tempo;
        self.scheduler.retime(&self.tempo);
    }

    // ---- Instruments ----------------------------------------------------

    pub fn register_instrument(
        &mut self,
        key: impl Into<String>,
        factory: impl InstrumentFactory + 'static,
    ) {
        self.registry.register(key, factory);
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut InstrumentRegistry {
        &mut self.registry
    }

    // ---- Nodes ----------------------------------------------------------

    fn invalidate(&mut self) {
        if self.graph.take().is_some() {
            debug!("graph topology changed, reload required");
        }
        self.state = EngineState::Unloaded;
    }

    fn insert(&mut self, name: &str, processor: Box<dyn Processor>) {
        let kind = processor.kind();
        match self.nodes.get_mut(name) {
            Some(slot) => {
                warn!(node = name, kind, "replacing existing node");
                slot.processor = processor;
            }
            None => {
                debug!(node = name, kind, "created node");
                self.nodes.insert(name.to_string(), NodeSlot::new(processor));
            }
        }
        self.invalidate();
    }

    fn insert_typed<T: Processor>(&mut self, name: &str, processor: T) -> Result<&mut T> {
        self.insert(name, Box::new(processor));
        self.processor_mut::<T>(name)
    }

    /// Add a caller-supplied processor. An existing node with this name is
    /// replaced.
    pub fn add_processor(&mut self, name: &str, processor: Box<dyn Processor>) {
        self.insert(name, processor);
    }

    /// Sine source on `channels` outputs.
    pub fn make_oscillator(
        &mut self,
        name: &str,
        frequency: f32,
        channels: usize,
    ) -> Result<&mut OscillatorNode> {
        self.insert_typed(name, OscillatorNode::new(frequency, channels)?)
    }

    pub fn make_playback(
        &mut self,
        name: &str,
        source: Arc<SourceBuffer>,
    ) -> Result<&mut PlaybackNode> {
        self.insert_typed(name, PlaybackNode::new(source))
    }

    pub fn make_warp(&mut self, name: &str, source: Arc<SourceBuffer>) -> Result<&mut WarpNode> {
        self.insert_typed(name, WarpNode::new(source))
    }

    /// Summing bus; producers must each supply `channels` channels.
    pub fn make_add(&mut self, name: &str, channels: usize) -> Result<&mut AddNode> {
        self.insert_typed(name, AddNode::new(channels)?)
    }

    pub fn make_gain(&mut self, name: &str, gain: f32) -> Result<&mut GainNode> {
        self.insert_typed(name, GainNode::new(gain))
    }

    /// Polyphonic node playing the instrument registered under
    /// `instrument_key`.
    pub fn make_poly(
        &mut self,
        name: &str,
        instrument_key: &str,
        num_voices: usize,
    ) -> Result<&mut PolyNode> {
        let factory = self.registry.get(instrument_key)?;
        let node = PolyNode::new(instrument_key, factory, num_voices, self.config.sample_rate)?;
        self.insert_typed(name, node)
    }

    /// Give a poly node a shared post-stage from the registry.
    pub fn set_poly_effect(&mut self, name: &str, effect_key: &str) -> Result<()> {
        let factory = self.registry.get(effect_key)?;
        self.processor_mut::<PolyNode>(name)?
            .set_effect(effect_key, factory)?;
        self.invalidate();
        Ok(())
    }

    pub fn remove_processor(&mut self, name: &str) -> Result<()> {
        if self.nodes.remove(name).is_none() {
            return Err(EngineError::UnknownNode {
                name: name.to_string(),
            });
        }
        self.scheduler.clear(name);
        self.recordings.remove(name);
        self.automation.remove(name);
        debug!(node = name, "removed node");
        self.invalidate();
        Ok(())
    }

    fn slot(&self, name: &str) -> Result<&NodeSlot> {
        self.nodes.get(name).ok_or_else(|| EngineError::UnknownNode {
            name: name.to_string(),
        })
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut NodeSlot> {
        self.nodes.get_mut(name).ok_or_else(|| EngineError::UnknownNode {
            name: name.to_string(),
        })
    }

    /// Typed access to a node.
    pub fn processor<T: Processor>(&self, name: &str) -> Result<&T> {
        self.slot(name)?
            .processor
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| EngineError::WrongNodeType {
                name: name.to_string(),
            })
    }

    /// Typed mutable access to a node. Changes that alter a node's channel
    /// count take effect at the next `load_graph`.
    pub fn processor_mut<T: Processor>(&mut self, name: &str) -> Result<&mut T> {
        self.slot_mut(name)?
            .processor
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| EngineError::WrongNodeType {
                name: name.to_string(),
            })
    }

    pub fn set_record(&mut self, name: &str, record: bool) -> Result<()> {
        self.slot_mut(name)?.record = record;
        Ok(())
    }

    pub fn set_record_automation(&mut self, name: &str, record: bool) -> Result<()> {
        self.slot_mut(name)?.record_automation = record;
        Ok(())
    }

    // ---- Parameters -----------------------------------------------------

    fn param_index(&self, name: &str, id: &ParamId) -> Result<usize> {
        self.slot(name)?
            .processor
            .params()
            .resolve(id)
            .ok_or_else(|| EngineError::UnknownParameter {
                node: name.to_string(),
                param: id.to_string(),
            })
    }

    pub fn parameter_paths(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .slot(name)?
            .processor
            .params()
            .paths()
            .map(str::to_string)
            .collect())
    }

    pub fn get_parameter(&self, name: &str, id: impl Into<ParamId>) -> Result<f32> {
        let index = self.param_index(name, &id.into())?;
        Ok(self.slot(name)?.processor.params().value(index))
    }

    /// Set a constant value, replacing any automation on the parameter.
    pub fn set_parameter(&mut self, name: &str, id: impl Into<ParamId>, value: f32) -> Result<()> {
        let index = self.param_index(name, &id.into())?;
        self.slot_mut(name)?
            .processor
            .params_mut()
            .set_value(index, value);
        Ok(())
    }

    pub fn set_automation(
        &mut self,
        name: &str,
        id: impl Into<ParamId>,
        curve: AutomationCurve,
    ) -> Result<()> {
        let index = self.param_index(name, &id.into())?;
        self.slot_mut(name)?
            .processor
            .params_mut()
            .set_curve(index, curve)
    }

    /// Drop any automation curve and hold `value`.
    pub fn set_automation_value(
        &mut self,
        name: &str,
        id: impl Into<ParamId>,
        value: f32,
    ) -> Result<()> {
        self.set_parameter(name, id, value)
    }

    // ---- Notes ----------------------------------------------------------

    /// Queue a note for `name`. Returns the number of events added (two).
    pub fn add_note(&mut self, name: &str, note: Note, unit: TimeUnit) -> Result<usize> {
        self.slot(name)?;
        self.scheduler.enqueue(name, note, unit, &self.tempo)
    }

    pub fn clear_notes(&mut self, name: &str) -> Result<()> {
        self.slot(name)?;
        self.scheduler.clear(name);
        Ok(())
    }

    /// Number of scheduled note events (on and off) for `name`.
    pub fn note_event_count(&self, name: &str) -> usize {
        self.scheduler.event_count(name)
    }

    // ---- Graph ----------------------------------------------------------

    /// Check and load a graph description.
    ///
    /// Fails on duplicate or cyclic nodes, unknown nodes, producers missing
    /// from the description, and channel layouts a node doesn't accept.
    pub fn load_graph(&mut self, description: GraphDescription) -> Result<()> {
        let _span = debug_span!("load_graph", steps = description.steps().len()).entered();
        self.graph = None;
        self.state = EngineState::Unloaded;

        let nodes = &self.nodes;
        let plan = plan(&description, |name| nodes.contains_key(name))?;

        let sample_rate = self.config.sample_rate;
        let steps = description.steps();
        let mut outputs = vec![0; steps.len()];
        for &step in &plan.order {
            let name = steps[step].node.as_str();
            let channels: usize = plan.producers[step].iter().map(|&p| outputs[p]).sum();
            let slot = self.slot_mut(name)?;

            let layout = slot.processor.input_layout();
            if !layout.accepts(channels) {
                return Err(EngineError::ChannelMismatch {
                    node: name.to_string(),
                    expected: layout.expected(channels),
                    actual: channels,
                });
            }
            slot.processor.configure(channels, sample_rate)?;
            outputs[step] = slot.processor.num_outputs();
            debug!(
                node = name,
                inputs = channels,
                outputs = outputs[step],
                "configured"
            );
        }

        self.description = Some(description.clone());
        self.graph = Some(LoadedGraph {
            description,
            plan,
            outputs,
        });
        self.state = EngineState::Loaded;
        Ok(())
    }

    /// Number of samples a render of `duration` would produce.
    pub fn render_length(&self, duration: f64, unit: TimeUnit) -> Result<u64> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(EngineError::InvalidDuration { duration });
        }
        let seconds = match unit {
            TimeUnit::Seconds => duration,
            TimeUnit::Beats => self.tempo.seconds_at_beat(duration),
        };
        Ok(round_half_up(seconds * self.config.sample_rate))
    }

    /// Render the loaded graph from t = 0 for `duration`.
    ///
    /// On error nothing is recorded; audio from an earlier render is
    /// discarded either way.
    pub fn render(&mut self, duration: f64, unit: TimeUnit) -> Result<()> {
        let total = self.render_length(duration, unit)?;

        let graph = match &self.graph {
            Some(graph) if !graph.description.is_empty() => graph,
            Some(_) => return Err(EngineError::EmptyGraph),
            None if self.nodes.is_empty() || self.description.is_none() => {
                return Err(EngineError::EmptyGraph)
            }
            None => return Err(EngineError::GraphNotLoaded),
        };

        let steps = graph.description.steps();
        for (step, expected) in graph.outputs.iter().enumerate() {
            let actual = self.slot(&steps[step].node)?.processor.num_outputs();
            if actual != *expected {
                warn!(
                    node = steps[step].node.as_str(),
                    expected, actual, "channel count changed since load"
                );
                return Err(EngineError::GraphNotLoaded);
            }
        }

        let _span = debug_span!("render", samples = total).entered();
        self.recordings.clear();
        self.automation.clear();
        let previous = self.state;
        self.state = EngineState::Rendering;

        let result = self.run(total);
        match result {
            Ok((recordings, automation)) => {
                self.recordings = recordings;
                self.automation = automation;
                self.state = EngineState::Rendered;
                debug!(samples = total, "render finished");
                Ok(())
            }
            Err(err) => {
                self.state = match previous {
                    EngineState::Rendered => EngineState::Loaded,
                    other => other,
                };
                Err(err)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn run(
        &mut self,
        total: u64,
    ) -> Result<(
        BTreeMap<String, Vec<Vec<f32>>>,
        BTreeMap<String, BTreeMap<String, Vec<f32>>>,
    )> {
        let Some(graph) = &self.graph else {
            return Err(EngineError::GraphNotLoaded);
        };
        let steps = graph.description.steps();
        let last = steps.len() - 1;
        let block_size = self.config.block_size;

        let mut recordings = BTreeMap::new();
        let mut automation = BTreeMap::new();
        for (step, info) in steps.iter().enumerate() {
            let slot = self.nodes.get_mut(&info.node).ok_or_else(|| EngineError::UnknownNode {
                name: info.node.clone(),
            })?;
            slot.processor.reset();
            if slot.record || step == last {
                recordings.insert(
                    info.node.clone(),
                    vec![Vec::with_capacity(total as usize); graph.outputs[step]],
                );
            }
            if slot.record_automation {
                let captured: BTreeMap<String, Vec<f32>> = slot
                    .processor
                    .params()
                    .paths()
                    .map(|p| (p.to_string(), Vec::with_capacity(total as usize)))
                    .collect();
                automation.insert(info.node.clone(), captured);
            }
        }
        self.scheduler.rewind();

        let mut buffers: Vec<Vec<Vec<f32>>> = graph
            .outputs
            .iter()
            .map(|&channels| vec![Vec::with_capacity(block_size); channels])
            .collect();
        let mut events: Vec<BlockEvent> = Vec::new();

        let mut start = 0u64;
        while start < total {
            let len = block_size.min((total - start) as usize);
            let ctx = BlockCtx {
                sample_rate: self.config.sample_rate,
                start,
                len,
                tempo: &self.tempo,
            };

            for &step in &graph.plan.order {
                let name = steps[step].node.as_str();
                let slot = self.nodes.get_mut(name).ok_or_else(|| EngineError::UnknownNode {
                    name: name.to_string(),
                })?;

                let params = slot.processor.params_mut();
                params.prepare_block(start, len, &self.tempo);
                if let Some(captured) = automation.get_mut(name) {
                    for (i, path) in params.paths().enumerate() {
                        if let Some(values) = captured.get_mut(path) {
                            values.extend_from_slice(params.block(i));
                        }
                    }
                }

                self.scheduler.drain_block(name, start, len, &mut events);

                let mut out = std::mem::take(&mut buffers[step]);
                for channel in out.iter_mut() {
                    channel.clear();
                    channel.resize(len, 0.0);
                }
                {
                    let inputs: Vec<&[f32]> = graph.plan.producers[step]
                        .iter()
                        .flat_map(|&p| buffers[p].iter().map(|c| &c[..len]))
                        .collect();
                    slot.processor.process(&ctx, &inputs, &mut out, &events)?;
                }

                if let Some(recording) = recordings.get_mut(name) {
                    for (rec, channel) in recording.iter_mut().zip(&out) {
                        rec.extend_from_slice(channel);
                    }
                }
                buffers[step] = out;
            }

            start += len as u64;
        }

        Ok((recordings, automation))
    }

    // ---- Results --------------------------------------------------------

    /// Audio from the last render as `channels × samples`.
    ///
    /// `None` returns the graph output; a name returns that node if it was
    /// recorded.
    pub fn get_audio(&self, name: Option<&str>) -> Result<&[Vec<f32>]> {
        let name = match name {
            Some(name) => name,
            None => self
                .description
                .as_ref()
                .and_then(GraphDescription::output)
                .ok_or(EngineError::EmptyGraph)?,
        };
        self.slot(name)?;
        self.recordings
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::NotRecorded {
                name: name.to_string(),
            })
    }

    /// Per-sample parameter values captured in the last render, by path.
    pub fn get_automation(&self, name: &str) -> Result<&BTreeMap<String, Vec<f32>>> {
        self.slot(name)?;
        self.automation
            .get(name)
            .ok_or_else(|| EngineError::NotRecorded {
                name: name.to_string(),
            })
    }
}
