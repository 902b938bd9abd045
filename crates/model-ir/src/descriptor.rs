// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The expected inference architecture and the class label set.
//!
//! An [`ArchitectureDescriptor`] is the single source of truth for what a
//! deployable classifier looks like: input resolution, which backbone to
//! instantiate, the exact head sequence and the class count. It is checked
//! once at construction (or deserialization) and never mutated afterwards.

use crate::backbone::BackboneSpec;
use crate::{Activation, LayerNode, LayerOp, LayerRole, ModelError};
use std::collections::{BTreeMap, HashSet};
use tensor_core::Shape;

// ── Head layers ────────────────────────────────────────────────────

/// One layer of the classification head, with its hyper-parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeadLayer {
    GlobalAveragePool,
    Dropout {
        rate: f32,
    },
    Dense {
        units: usize,
        #[serde(default)]
        activation: Activation,
    },
    /// Final projection onto the class count.
    Output {
        #[serde(default = "softmax")]
        activation: Activation,
    },
}

fn softmax() -> Activation {
    Activation::Softmax
}

impl HeadLayer {
    /// The role tag a node built from this head layer carries.
    pub fn role(&self) -> LayerRole {
        match self {
            Self::GlobalAveragePool => LayerRole::Pooling,
            Self::Dropout { .. } => LayerRole::Dropout,
            Self::Dense { .. } => LayerRole::Dense,
            Self::Output { .. } => LayerRole::Output,
        }
    }

    /// The op a node built from this head layer performs.
    pub fn to_op(&self, num_classes: usize) -> LayerOp {
        match self {
            Self::GlobalAveragePool => LayerOp::GlobalAveragePool,
            Self::Dropout { rate } => LayerOp::Dropout { rate: *rate },
            Self::Dense { units, activation } => LayerOp::Dense {
                units: *units,
                activation: *activation,
            },
            Self::Output { activation } => LayerOp::Dense {
                units: num_classes,
                activation: *activation,
            },
        }
    }

    /// Recovers the head layer a node represents.
    ///
    /// Returns `None` for backbone nodes and role/op combinations that do
    /// not describe a head layer.
    pub fn from_node(node: &LayerNode) -> Option<Self> {
        match (node.role, &node.op) {
            (LayerRole::Pooling, LayerOp::GlobalAveragePool) => Some(Self::GlobalAveragePool),
            (LayerRole::Dropout, LayerOp::Dropout { rate }) => Some(Self::Dropout { rate: *rate }),
            (LayerRole::Dense, LayerOp::Dense { units, activation }) => Some(Self::Dense {
                units: *units,
                activation: *activation,
            }),
            (LayerRole::Output, LayerOp::Dense { activation, .. }) => Some(Self::Output {
                activation: *activation,
            }),
            _ => None,
        }
    }
}

// ── ArchitectureDescriptor ─────────────────────────────────────────

/// The expected architecture of the deployable classifier.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "DescriptorFields")]
pub struct ArchitectureDescriptor {
    input_shape: Shape,
    backbone: BackboneSpec,
    head: Vec<HeadLayer>,
    num_classes: usize,
}

#[derive(serde::Deserialize)]
struct DescriptorFields {
    input_shape: Shape,
    #[serde(default)]
    backbone: BackboneSpec,
    #[serde(default = "standard_head_default")]
    head: Vec<HeadLayer>,
    num_classes: usize,
}

fn standard_head_default() -> Vec<HeadLayer> {
    ArchitectureDescriptor::standard_head(ArchitectureDescriptor::DEFAULT_HIDDEN_UNITS)
}

impl TryFrom<DescriptorFields> for ArchitectureDescriptor {
    type Error = ModelError;

    fn try_from(f: DescriptorFields) -> Result<Self, Self::Error> {
        Self::new(f.input_shape, f.backbone, f.head, f.num_classes)
    }
}

impl ArchitectureDescriptor {
    /// Hidden width of the canonical head.
    pub const DEFAULT_HIDDEN_UNITS: usize = 128;
    /// Dropout rate of the canonical head.
    pub const DEFAULT_DROPOUT: f32 = 0.2;
    /// Class count of the canonical descriptor.
    pub const DEFAULT_NUM_CLASSES: usize = 20;

    /// Creates a descriptor after checking it is internally consistent.
    ///
    /// # Checks
    /// - `input_shape` is a positive `[H, W, C]` shape.
    /// - `num_classes` and the backbone width are positive.
    /// - The head starts with global average pooling, ends with exactly one
    ///   output layer, and every dropout rate lies in `[0, 1)`.
    /// - Every head layer accepts the shape the previous one produces.
    pub fn new(
        input_shape: Shape,
        backbone: BackboneSpec,
        head: Vec<HeadLayer>,
        num_classes: usize,
    ) -> Result<Self, ModelError> {
        if input_shape.rank() != 3 || !input_shape.is_positive() {
            return Err(ModelError::InvalidDescriptor(format!(
                "input shape must be a positive [H, W, C], got {input_shape}"
            )));
        }
        if num_classes == 0 {
            return Err(ModelError::InvalidDescriptor(
                "class count must be positive".into(),
            ));
        }
        if backbone.width == 0 {
            return Err(ModelError::InvalidDescriptor(
                "backbone width must be positive".into(),
            ));
        }
        if head.first() != Some(&HeadLayer::GlobalAveragePool) {
            return Err(ModelError::InvalidDescriptor(
                "head must start with global average pooling".into(),
            ));
        }
        let outputs = head
            .iter()
            .filter(|h| matches!(h, HeadLayer::Output { .. }))
            .count();
        if outputs != 1 || !matches!(head.last(), Some(HeadLayer::Output { .. })) {
            return Err(ModelError::InvalidDescriptor(
                "head must end with exactly one output layer".into(),
            ));
        }
        for layer in &head {
            match layer {
                HeadLayer::Dropout { rate } if !(0.0..1.0).contains(rate) => {
                    return Err(ModelError::InvalidDescriptor(format!(
                        "dropout rate {rate} outside [0, 1)"
                    )));
                }
                HeadLayer::Dense { units: 0, .. } => {
                    return Err(ModelError::InvalidDescriptor(
                        "dense units must be positive".into(),
                    ));
                }
                _ => {}
            }
        }
        // The head must chain: pooling yields a vector, so a second pool
        // (or anything else shape-incompatible) is unbuildable.
        let mut shape = Shape::image(1, 1, backbone.feature_channels());
        for (i, layer) in head.iter().enumerate() {
            shape = layer
                .to_op(num_classes)
                .infer(&[&shape])
                .map(|(out, _)| out)
                .map_err(|e| {
                    ModelError::InvalidDescriptor(format!(
                        "head layer {i} ({}) cannot be built: {e}",
                        layer.role().as_str()
                    ))
                })?;
        }

        Ok(Self {
            input_shape,
            backbone,
            head,
            num_classes,
        })
    }

    /// Pooling, dropout, dense(`hidden`, relu), dropout, softmax output.
    pub fn standard_head(hidden: usize) -> Vec<HeadLayer> {
        vec![
            HeadLayer::GlobalAveragePool,
            HeadLayer::Dropout {
                rate: Self::DEFAULT_DROPOUT,
            },
            HeadLayer::Dense {
                units: hidden,
                activation: Activation::Relu,
            },
            HeadLayer::Dropout {
                rate: Self::DEFAULT_DROPOUT,
            },
            HeadLayer::Output {
                activation: Activation::Softmax,
            },
        ]
    }

    /// Canonical descriptor: 224×224×3 input, default backbone, standard
    /// head with 128 hidden units, 20 classes.
    pub fn canonical() -> Self {
        Self {
            input_shape: Shape::image(224, 224, 3),
            backbone: BackboneSpec::default(),
            head: Self::standard_head(Self::DEFAULT_HIDDEN_UNITS),
            num_classes: Self::DEFAULT_NUM_CLASSES,
        }
    }

    pub fn input_shape(&self) -> &Shape {
        &self.input_shape
    }

    pub fn backbone(&self) -> &BackboneSpec {
        &self.backbone
    }

    pub fn head(&self) -> &[HeadLayer] {
        &self.head
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl Default for ArchitectureDescriptor {
    fn default() -> Self {
        Self::canonical()
    }
}

// ── LabelSet ───────────────────────────────────────────────────────

/// Ordered, duplicate-free class names. Index `i` names output `i`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Creates a label set, rejecting empty sets and duplicate names.
    pub fn new(names: Vec<String>) -> Result<Self, ModelError> {
        if names.is_empty() {
            return Err(ModelError::InvalidDescriptor("label set is empty".into()));
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ModelError::InvalidDescriptor(format!(
                    "duplicate label '{name}'"
                )));
            }
        }
        Ok(Self { names })
    }

    /// Generates `class_0 .. class_{n-1}`.
    pub fn numbered(n: usize) -> Result<Self, ModelError> {
        Self::new((0..n).map(|i| format!("class_{i}")).collect())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the label for output index `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the `label -> index` table persisted next to artifacts.
    pub fn index_map(&self) -> BTreeMap<String, usize> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect()
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = ModelError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(set: LabelSet) -> Self {
        set.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(num_classes: usize) -> Result<ArchitectureDescriptor, ModelError> {
        ArchitectureDescriptor::new(
            Shape::image(32, 32, 3),
            BackboneSpec::default(),
            ArchitectureDescriptor::standard_head(16),
            num_classes,
        )
    }

    #[test]
    fn test_canonical() {
        let d = ArchitectureDescriptor::canonical();
        assert_eq!(d.input_shape(), &Shape::image(224, 224, 3));
        assert_eq!(d.num_classes(), 20);
        assert_eq!(d.head().len(), 5);
        assert_eq!(
            d.head()[2],
            HeadLayer::Dense {
                units: 128,
                activation: Activation::Relu
            }
        );
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(ArchitectureDescriptor::new(
            Shape::matrix(32, 32),
            BackboneSpec::default(),
            ArchitectureDescriptor::standard_head(16),
            4
        )
        .is_err());
        assert!(small(0).is_err());
        assert!(small(4).is_ok());
    }

    #[test]
    fn test_new_rejects_bad_head() {
        let no_pool = vec![HeadLayer::Output {
            activation: Activation::Softmax,
        }];
        assert!(ArchitectureDescriptor::new(
            Shape::image(8, 8, 3),
            BackboneSpec::default(),
            no_pool,
            3
        )
        .is_err());

        let two_outputs = vec![
            HeadLayer::GlobalAveragePool,
            HeadLayer::Output {
                activation: Activation::Linear,
            },
            HeadLayer::Output {
                activation: Activation::Softmax,
            },
        ];
        assert!(ArchitectureDescriptor::new(
            Shape::image(8, 8, 3),
            BackboneSpec::default(),
            two_outputs,
            3
        )
        .is_err());
    }

    #[test]
    fn test_new_rejects_unchainable_head() {
        let err = ArchitectureDescriptor::new(
            Shape::image(32, 32, 3),
            BackboneSpec::default(),
            vec![
                HeadLayer::GlobalAveragePool,
                HeadLayer::GlobalAveragePool,
                HeadLayer::Output {
                    activation: Activation::Softmax,
                },
            ],
            4,
        )
        .unwrap_err();
        match err {
            ModelError::InvalidDescriptor(msg) => assert!(msg.contains("head layer 1"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_every_accepted_head_builds() {
        let d = small(3).unwrap();
        crate::backbone::build(&d, "chain").unwrap();
    }

    #[test]
    fn test_deserialize_validates() {
        let ok = r#"{ "input_shape": [32, 32, 3], "num_classes": 5 }"#;
        let d: ArchitectureDescriptor = serde_json::from_str(ok).unwrap();
        assert_eq!(d.num_classes(), 5);
        assert_eq!(d.head(), ArchitectureDescriptor::standard_head(128).as_slice());

        let bad = r#"{ "input_shape": [32, 32], "num_classes": 5 }"#;
        assert!(serde_json::from_str::<ArchitectureDescriptor>(bad).is_err());
    }

    #[test]
    fn test_head_layer_roles() {
        assert_eq!(HeadLayer::GlobalAveragePool.role(), LayerRole::Pooling);
        assert_eq!(
            HeadLayer::Output {
                activation: Activation::Softmax
            }
            .to_op(7),
            LayerOp::Dense {
                units: 7,
                activation: Activation::Softmax
            }
        );
    }

    #[test]
    fn test_label_set_rejects_duplicates() {
        assert!(LabelSet::new(vec!["dosa".into(), "idly".into(), "dosa".into()]).is_err());
        assert!(LabelSet::new(vec![]).is_err());
    }

    #[test]
    fn test_label_set_index_map() {
        let labels = LabelSet::new(vec!["samosa".into(), "chaat".into()]).unwrap();
        let map = labels.index_map();
        assert_eq!(map["samosa"], 0);
        assert_eq!(map["chaat"], 1);
        assert_eq!(labels.get(1), Some("chaat"));
        assert_eq!(labels.get(2), None);
    }

    #[test]
    fn test_label_set_serde() {
        let labels: LabelSet = serde_json::from_str(r#"["a", "b", "c"]"#).unwrap();
        assert_eq!(labels.len(), 3);
        assert!(serde_json::from_str::<LabelSet>(r#"["a", "a"]"#).is_err());
        assert_eq!(serde_json::to_string(&labels).unwrap(), r#"["a","b","c"]"#);
    }
}
