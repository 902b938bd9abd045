// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model graph: a classifier as an ordered sequence of role-tagged layers.
//!
//! # Type-State Pattern
//!
//! The graph transitions through states enforced at compile time:
//!
//! ```text
//! ModelGraph<Loaded>    : nodes assembled, weights mutable, not yet checked.
//!       │  .validate()
//!       ▼
//! ModelGraph<Validated> : edges resolved, shapes inferred and checked,
//!                          ready for execution and conversion.
//! ```
//!
//! Only a validated graph can be executed, reconciled or converted. The
//! transition consumes the old state; the marker types are `PhantomData`.

use crate::{HeadLayer, LayerNode, LayerRole, ModelError};
use std::collections::HashMap;
use std::fmt;
use tensor_core::Shape;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been assembled but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

/// Where a node reads one of its inputs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    GraphInput,
    Node(usize),
}

/// Per-node facts resolved during validation.
#[derive(Debug, Clone)]
pub(crate) struct NodePlan {
    pub(crate) sources: Vec<Source>,
    pub(crate) output_shape: Shape,
}

// ── ModelGraph ─────────────────────────────────────────────────────

/// A classifier graph. `S` encodes the validation state.
#[derive(Debug, Clone)]
pub struct ModelGraph<S: GraphState = Loaded> {
    /// Human-readable model name (e.g., `"food_classifier"`).
    pub name: String,
    input_shape: Shape,
    num_classes: usize,
    nodes: Vec<LayerNode>,
    /// Empty until validated; parallel to `nodes` afterwards.
    pub(crate) plan: Vec<NodePlan>,
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl ModelGraph<Loaded> {
    /// Creates a new graph in the `Loaded` state.
    pub fn new(name: String, input_shape: Shape, num_classes: usize, nodes: Vec<LayerNode>) -> Self {
        Self {
            name,
            input_shape,
            num_classes,
            nodes,
            plan: Vec::new(),
            _state: std::marker::PhantomData,
        }
    }

    /// Mutable access to the nodes. Only available before validation.
    pub fn nodes_mut(&mut self) -> &mut [LayerNode] {
        &mut self.nodes
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The graph is non-empty, the input is a positive `[H, W, C]` shape
    ///   and the class count is positive.
    /// - Layer names are unique.
    /// - Every role carries an op it may carry.
    /// - Every input edge names an earlier layer.
    /// - Every weight tensor has exactly the shape its op requires.
    /// - Exactly one `output` layer exists, it is last, and it produces
    ///   `[num_classes]`.
    pub fn validate(self) -> Result<ModelGraph<Validated>, ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::InvalidGraph(
                "model graph contains no layers".into(),
            ));
        }
        if self.input_shape.rank() != 3 || !self.input_shape.is_positive() {
            return Err(ModelError::InvalidGraph(format!(
                "input shape must be a positive [H, W, C], got {}",
                self.input_shape
            )));
        }
        if self.num_classes == 0 {
            return Err(ModelError::InvalidGraph("class count must be positive".into()));
        }

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.nodes.len());
        let mut plan: Vec<NodePlan> = Vec::with_capacity(self.nodes.len());

        for (i, node) in self.nodes.iter().enumerate() {
            let invalid = |detail: String| ModelError::InvalidLayer {
                layer: node.name.clone(),
                detail,
            };

            if index.insert(node.name.as_str(), i).is_some() {
                return Err(invalid("duplicate layer name".into()));
            }
            if !node.op.allowed_for(node.role) {
                return Err(invalid(format!(
                    "role '{}' cannot carry op '{}'",
                    node.role,
                    node.op.kind()
                )));
            }

            let sources = if node.inputs.is_empty() {
                vec![if i == 0 { Source::GraphInput } else { Source::Node(i - 1) }]
            } else {
                node.inputs
                    .iter()
                    .map(|name| match index.get(name.as_str()) {
                        Some(&j) if j < i => Ok(Source::Node(j)),
                        _ => Err(invalid(format!(
                            "input '{name}' does not name an earlier layer"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?
            };

            let input_shapes: Vec<&Shape> = sources
                .iter()
                .map(|s| match *s {
                    Source::GraphInput => &self.input_shape,
                    Source::Node(j) => &plan[j].output_shape,
                })
                .collect();

            let (output_shape, expected) = node.op.infer(&input_shapes).map_err(&invalid)?;

            if node.weights().len() != expected.len() {
                return Err(invalid(format!(
                    "expected {} weight tensors, got {}",
                    expected.len(),
                    node.weights().len()
                )));
            }
            for (k, (want, got)) in expected.iter().zip(node.weight_shapes()).enumerate() {
                if want != got {
                    return Err(invalid(format!("weight {k}: expected shape {want}, got {got}")));
                }
            }

            tracing::trace!(layer = %node.name, shape = %output_shape, "inferred output shape");
            plan.push(NodePlan {
                sources,
                output_shape,
            });
        }

        let outputs = self
            .nodes
            .iter()
            .filter(|n| n.role == LayerRole::Output)
            .count();
        let last = &self.nodes[self.nodes.len() - 1];
        if outputs != 1 || last.role != LayerRole::Output {
            return Err(ModelError::InvalidGraph(
                "graph must end with exactly one output layer".into(),
            ));
        }
        let produced = &plan[plan.len() - 1].output_shape;
        if produced != &Shape::vector(self.num_classes) {
            return Err(ModelError::InvalidGraph(format!(
                "output layer produces {produced}, but the graph declares {} classes",
                self.num_classes
            )));
        }

        Ok(ModelGraph {
            name: self.name,
            input_shape: self.input_shape,
            num_classes: self.num_classes,
            nodes: self.nodes,
            plan,
            _state: std::marker::PhantomData,
        })
    }
}

// ── Validated state ────────────────────────────────────────────────

impl ModelGraph<Validated> {
    /// Returns the total number of layers.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns a reference to a layer by index.
    pub fn node(&self, index: usize) -> Option<&LayerNode> {
        self.nodes.get(index)
    }

    /// Returns an iterator over the layers in execution order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &LayerNode> {
        self.nodes.iter()
    }

    /// Layers tagged `backbone`, in order.
    pub fn backbone_nodes(&self) -> impl Iterator<Item = &LayerNode> {
        self.nodes.iter().filter(|n| !n.role.is_head())
    }

    /// Layers belonging to the head, in order.
    pub fn head_nodes(&self) -> impl Iterator<Item = &LayerNode> {
        self.nodes.iter().filter(|n| n.role.is_head())
    }

    /// The inferred output shape of layer `index`.
    pub fn output_shape_of(&self, index: usize) -> Option<&Shape> {
        self.plan.get(index).map(|p| &p.output_shape)
    }

    /// The head as a sequence of [`HeadLayer`]s, comparable against an
    /// architecture descriptor.
    pub fn head_signature(&self) -> Vec<HeadLayer> {
        self.head_nodes().filter_map(HeadLayer::from_node).collect()
    }

    /// Total number of scalar parameters.
    pub fn param_count(&self) -> usize {
        self.nodes.iter().map(LayerNode::param_count).sum()
    }

    /// Total weight footprint in bytes at `f32` precision.
    pub fn total_weight_bytes(&self) -> usize {
        self.nodes.iter().map(LayerNode::weight_bytes).sum()
    }

    /// Consumes the graph and returns its layers.
    pub fn into_nodes(self) -> Vec<LayerNode> {
        self.nodes
    }

    /// Returns a summary string describing the model.
    pub fn summary(&self) -> String {
        let weight_mb = self.total_weight_bytes() as f64 / (1024.0 * 1024.0);
        format!(
            "Model '{}': {} layers ({} backbone, {} head), input {}, {} classes, {} params ({:.2} MB f32)",
            self.name,
            self.num_nodes(),
            self.backbone_nodes().count(),
            self.head_nodes().count(),
            self.input_shape,
            self.num_classes,
            self.param_count(),
            weight_mb,
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> ModelGraph<S> {
    /// The expected input shape (`[H, W, C]`, implicit batch of 1).
    pub fn input_shape(&self) -> &Shape {
        &self.input_shape
    }

    /// The declared class count.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// The layers in execution order.
    pub fn nodes(&self) -> &[LayerNode] {
        &self.nodes
    }
}

impl<S: GraphState> fmt::Display for ModelGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ModelGraph '{}' ({} layers):", self.name, self.nodes.len())?;
        for (i, node) in self.nodes.iter().enumerate() {
            writeln!(f, "  [{i}] {}", node.summary())?;
        }
        Ok(())
    }
}
