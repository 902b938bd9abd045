// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Backbone catalogue: builds fresh, deterministically initialised graphs
//! from an [`ArchitectureDescriptor`].
//!
//! Weights use Kaiming-uniform initialisation drawn from a seeded
//! [`StdRng`]; biases start at zero. Backbone and head draw from separate
//! streams so the backbone's weights depend only on its own spec.

use crate::graph::{Loaded, ModelGraph, Validated};
use crate::{Activation, ArchitectureDescriptor, HeadLayer, LayerNode, LayerOp, LayerRole, ModelError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tensor_core::{Shape, Tensor};

/// Mixed into the seed for head initialisation.
const HEAD_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Known backbone families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackboneKind {
    /// Compact inverted-residual network in the style of MobileNetV2:
    /// a strided stem, three expand/depthwise/project blocks (residual
    /// where shapes allow) and a 1×1 feature projection.
    #[default]
    MobilenetV2Lite,
}

impl BackboneKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MobilenetV2Lite => "mobilenet_v2_lite",
        }
    }
}

impl std::fmt::Display for BackboneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backbone identity: family, base width and initialisation seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BackboneSpec {
    #[serde(default)]
    pub kind: BackboneKind,
    /// Channel count of the stem; later stages scale from it.
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_width() -> usize {
    16
}

fn default_seed() -> u64 {
    42
}

impl Default for BackboneSpec {
    fn default() -> Self {
        Self {
            kind: BackboneKind::default(),
            width: default_width(),
            seed: default_seed(),
        }
    }
}

impl BackboneSpec {
    /// Channel count of the backbone's final feature map.
    pub fn feature_channels(&self) -> usize {
        match self.kind {
            BackboneKind::MobilenetV2Lite => self.width * 4,
        }
    }
}

// ── Initialisation ─────────────────────────────────────────────────

struct WeightInit {
    rng: StdRng,
}

impl WeightInit {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Samples `U(-b, b)` with `b = sqrt(6 / fan_in)`.
    fn kaiming(&mut self, shape: Shape, fan_in: usize) -> Tensor {
        let bound = (6.0 / fan_in.max(1) as f32).sqrt();
        let mut t = Tensor::zeros(shape);
        for v in t.as_mut_slice() {
            *v = self.rng.random_range(-bound..bound);
        }
        t
    }
}

// ── MobileNetV2-lite ───────────────────────────────────────────────

/// `(expansion, out_channels multiplier, stride)` per inverted-residual block.
const MOBILENET_LITE_BLOCKS: [(usize, usize, usize); 3] = [(4, 1, 1), (4, 2, 2), (4, 2, 1)];

fn conv(
    init: &mut WeightInit,
    name: String,
    cin: usize,
    kernel: usize,
    stride: usize,
    filters: usize,
    activation: Activation,
) -> LayerNode {
    let weights = vec![
        init.kaiming(Shape::new(vec![kernel, kernel, cin, filters]), kernel * kernel * cin),
        Tensor::zeros(Shape::vector(filters)),
    ];
    LayerNode::new(
        name,
        LayerRole::Backbone,
        LayerOp::Conv2d {
            kernel,
            stride,
            filters,
            activation,
        },
        Vec::new(),
        weights,
    )
}

fn mobilenet_v2_lite(spec: &BackboneSpec, in_channels: usize) -> Vec<LayerNode> {
    let mut init = WeightInit::new(spec.seed);
    let w = spec.width;
    let mut nodes = Vec::new();

    nodes.push(conv(&mut init, "stem".into(), in_channels, 3, 2, w, Activation::Relu6));
    let mut channels = w;
    let mut block_input = "stem".to_string();

    for (i, &(expansion, mult, stride)) in MOBILENET_LITE_BLOCKS.iter().enumerate() {
        let prefix = format!("block_{}", i + 1);
        let hidden = channels * expansion;
        let out = w * mult;

        nodes.push(conv(
            &mut init,
            format!("{prefix}.expand"),
            channels,
            1,
            1,
            hidden,
            Activation::Relu6,
        ));
        nodes.push(LayerNode::new(
            format!("{prefix}.depthwise"),
            LayerRole::Backbone,
            LayerOp::DepthwiseConv2d {
                kernel: 3,
                stride,
                activation: Activation::Relu6,
            },
            Vec::new(),
            vec![
                init.kaiming(Shape::new(vec![3, 3, hidden]), 9),
                Tensor::zeros(Shape::vector(hidden)),
            ],
        ));
        let project = format!("{prefix}.project");
        nodes.push(conv(&mut init, project.clone(), hidden, 1, 1, out, Activation::Linear));

        if stride == 1 && channels == out {
            let add = format!("{prefix}.add");
            nodes.push(LayerNode::new(
                add.clone(),
                LayerRole::Backbone,
                LayerOp::Add,
                vec![block_input, project],
                Vec::new(),
            ));
            block_input = add;
        } else {
            block_input = project;
        }
        channels = out;
    }

    nodes.push(conv(
        &mut init,
        "features".into(),
        channels,
        1,
        1,
        spec.feature_channels(),
        Activation::Relu6,
    ));
    nodes
}

// ── Graph assembly ─────────────────────────────────────────────────

/// Instantiates the descriptor's backbone with fresh weights.
pub fn backbone_nodes(spec: &BackboneSpec, in_channels: usize) -> Vec<LayerNode> {
    match spec.kind {
        BackboneKind::MobilenetV2Lite => mobilenet_v2_lite(spec, in_channels),
    }
}

/// Instantiates the descriptor's head with fresh weights, consuming
/// `feature_channels` from the backbone.
pub fn head_nodes(descriptor: &ArchitectureDescriptor, feature_channels: usize) -> Vec<LayerNode> {
    let mut init = WeightInit::new(descriptor.backbone().seed ^ HEAD_SEED_SALT);
    let mut width = feature_channels;
    let mut dropouts = 0;
    let mut denses = 0;

    descriptor
        .head()
        .iter()
        .map(|layer| {
            let op = layer.to_op(descriptor.num_classes());
            let name = match layer {
                HeadLayer::GlobalAveragePool => "head.pool".to_string(),
                HeadLayer::Dropout { .. } => {
                    dropouts += 1;
                    format!("head.dropout_{dropouts}")
                }
                HeadLayer::Dense { .. } => {
                    denses += 1;
                    format!("head.dense_{denses}")
                }
                HeadLayer::Output { .. } => "head.predictions".to_string(),
            };
            let weights = match op {
                LayerOp::Dense { units, .. } => {
                    let w = vec![
                        init.kaiming(Shape::matrix(width, units), width),
                        Tensor::zeros(Shape::vector(units)),
                    ];
                    width = units;
                    w
                }
                _ => Vec::new(),
            };
            LayerNode::new(name, layer.role(), op, Vec::new(), weights)
        })
        .collect()
}

/// Builds a fresh, unvalidated graph matching `descriptor` exactly.
pub fn instantiate(descriptor: &ArchitectureDescriptor, name: &str) -> ModelGraph<Loaded> {
    let spec = descriptor.backbone();
    let in_channels = descriptor.input_shape().last_dim().unwrap_or(1);
    let mut nodes = backbone_nodes(spec, in_channels);
    nodes.extend(head_nodes(descriptor, spec.feature_channels()));
    ModelGraph::new(
        name.to_string(),
        descriptor.input_shape().clone(),
        descriptor.num_classes(),
        nodes,
    )
}

/// Builds and validates a fresh graph matching `descriptor` exactly.
pub fn build(descriptor: &ArchitectureDescriptor, name: &str) -> Result<ModelGraph<Validated>, ModelError> {
    instantiate(descriptor, name).validate()
}
