use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// One consumer and the producers feeding it, in input order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStep {
    pub node: String,
    pub inputs: Vec<String>,
}

/// Which nodes take part in a render and how they connect.
///
/// The last step is the graph's output. A consumer's input channels are its
/// producers' outputs concatenated in the listed order.
///
/// ```ignore
/// let graph = GraphDescription::new()
///     .node("synth", &[])
///     .node("loop", &[])
///     .node("mix", &["synth", "loop"]);
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphDescription {
    steps: Vec<GraphStep>,
}

impl GraphDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, name: &str, inputs: &[&str]) -> Self {
        self.push(name, inputs.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn push(&mut self, name: impl Into<String>, inputs: Vec<String>) {
        self.steps.push(GraphStep {
            node: name.into(),
            inputs,
        });
    }

    pub fn steps(&self) -> &[GraphStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Name of the output node.
    pub fn output(&self) -> Option<&str> {
        self.steps.last().map(|s| s.node.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.node == name)
    }
}

/// A checked description: step indices in execution order and, per step,
/// the step indices of its producers.
#[derive(Debug, Clone)]
pub(crate) struct ExecutionPlan {
    pub order: Vec<usize>,
    pub producers: Vec<Vec<usize>>,
}

/// Resolve producer names and sort the steps topologically.
///
/// `exists` reports whether the engine has a node by that name, so unknown
/// nodes (resource errors) are told apart from nodes that exist but were left
/// out of the description (configuration errors).
pub(crate) fn plan(
    description: &GraphDescription,
    exists: impl Fn(&str) -> bool,
) -> Result<ExecutionPlan> {
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for (i, step) in description.steps.iter().enumerate() {
        if index_of.insert(step.node.as_str(), i).is_some() {
            return Err(EngineError::DuplicateNode {
                name: step.node.clone(),
            });
        }
    }

    for step in &description.steps {
        if !exists(&step.node) {
            return Err(EngineError::UnknownNode {
                name: step.node.clone(),
            });
        }
    }

    let mut producers = Vec::with_capacity(description.steps.len());
    for step in &description.steps {
        let mut resolved = Vec::with_capacity(step.inputs.len());
        for input in &step.inputs {
            if !exists(input) {
                return Err(EngineError::UnknownProducer {
                    consumer: step.node.clone(),
                    producer: input.clone(),
                });
            }
            match index_of.get(input.as_str()) {
                Some(&i) => resolved.push(i),
                None => {
                    return Err(EngineError::UndeclaredProducer {
                        consumer: step.node.clone(),
                        producer: input.clone(),
                    })
                }
            }
        }
        producers.push(resolved);
    }

    // Edge: producer -> consumer (data flows this direction)
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..description.steps.len())
        .map(|i| graph.add_node(i))
        .collect();
    for (consumer, inputs) in producers.iter().enumerate() {
        for &producer in inputs {
            graph.add_edge(nodes[producer], nodes[consumer], ());
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| EngineError::CyclicGraph {
        node: description.steps[graph[cycle.node_id()]].node.clone(),
    })?;

    Ok(ExecutionPlan {
        order: order.into_iter().map(|idx| graph[idx]).collect(),
        producers,
    })
}
