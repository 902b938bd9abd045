// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer definitions for classifier graphs.
//!
//! Each [`LayerNode`] carries an explicit [`LayerRole`] assigned when the
//! graph is built or loaded, a typed [`LayerOp`] with its hyper-parameters,
//! and the weight tensors the op consumes. Roles are never inferred from
//! layer names.

use crate::ModelError;
use tensor_core::{Shape, Tensor};

/// Structural role of a layer within a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    /// Feature extractor.
    Backbone,
    /// Spatial pooling between backbone and head.
    Pooling,
    /// Regularization; stripped at inference.
    Dropout,
    /// Hidden projection in the head.
    Dense,
    /// Final classifier projection.
    Output,
}

impl LayerRole {
    /// Returns a human-readable label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backbone => "backbone",
            Self::Pooling => "pooling",
            Self::Dropout => "dropout",
            Self::Dense => "dense",
            Self::Output => "output",
        }
    }

    /// Returns `true` for every role that belongs to the classification head.
    pub fn is_head(self) -> bool {
        !matches!(self, Self::Backbone)
    }
}

impl std::fmt::Display for LayerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activation fused into a convolution or dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Relu6,
    Softmax,
}

impl Activation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Relu => "relu",
            Self::Relu6 => "relu6",
            Self::Softmax => "softmax",
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The computation a layer performs, with its hyper-parameters.
///
/// Weight layouts:
/// - `conv2d`: kernel `[K, K, C_in, filters]`, bias `[filters]`
/// - `depthwise_conv2d`: kernel `[K, K, C]`, bias `[C]`
/// - `dense`: weight `[N, units]`, bias `[units]`
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerOp {
    Conv2d {
        kernel: usize,
        stride: usize,
        filters: usize,
        #[serde(default)]
        activation: Activation,
    },
    DepthwiseConv2d {
        kernel: usize,
        stride: usize,
        #[serde(default)]
        activation: Activation,
    },
    Add,
    GlobalAveragePool,
    Dropout {
        rate: f32,
    },
    Dense {
        units: usize,
        #[serde(default)]
        activation: Activation,
    },
}

impl LayerOp {
    /// Returns the operator's manifest name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conv2d { .. } => "conv2d",
            Self::DepthwiseConv2d { .. } => "depthwise_conv2d",
            Self::Add => "add",
            Self::GlobalAveragePool => "global_average_pool",
            Self::Dropout { .. } => "dropout",
            Self::Dense { .. } => "dense",
        }
    }

    /// Suffixes used to name this op's weight tensors on disk.
    pub fn weight_suffixes(&self) -> &'static [&'static str] {
        match self {
            Self::Conv2d { .. } | Self::DepthwiseConv2d { .. } => &["kernel", "bias"],
            Self::Dense { .. } => &["weight", "bias"],
            Self::Add | Self::GlobalAveragePool | Self::Dropout { .. } => &[],
        }
    }

    /// Number of weight tensors this op consumes.
    pub fn weight_count(&self) -> usize {
        self.weight_suffixes().len()
    }

    /// Number of input edges this op consumes.
    pub fn arity(&self) -> usize {
        match self {
            Self::Add => 2,
            _ => 1,
        }
    }

    /// Returns the fused activation, if the op has one.
    pub fn activation(&self) -> Option<Activation> {
        match self {
            Self::Conv2d { activation, .. }
            | Self::DepthwiseConv2d { activation, .. }
            | Self::Dense { activation, .. } => Some(*activation),
            _ => None,
        }
    }

    /// Returns `true` if `role` may carry this op.
    pub fn allowed_for(&self, role: LayerRole) -> bool {
        match role {
            LayerRole::Backbone => matches!(
                self,
                Self::Conv2d { .. } | Self::DepthwiseConv2d { .. } | Self::Add
            ),
            LayerRole::Pooling => matches!(self, Self::GlobalAveragePool),
            LayerRole::Dropout => matches!(self, Self::Dropout { .. }),
            LayerRole::Dense | LayerRole::Output => matches!(self, Self::Dense { .. }),
        }
    }

    /// Infers the output shape and the expected weight shapes from the
    /// shapes of the op's inputs.
    pub fn infer(&self, inputs: &[&Shape]) -> Result<(Shape, Vec<Shape>), String> {
        if inputs.len() != self.arity() {
            return Err(format!(
                "{} takes {} input(s), got {}",
                self.kind(),
                self.arity(),
                inputs.len()
            ));
        }
        let input = inputs[0];

        match self {
            Self::Conv2d {
                kernel,
                stride,
                filters,
                ..
            } => {
                let (h, w, c) = image_dims(input)?;
                check_window(*kernel, *stride)?;
                if *filters == 0 {
                    return Err("filters must be positive".into());
                }
                Ok((
                    Shape::image(h.div_ceil(*stride), w.div_ceil(*stride), *filters),
                    vec![
                        Shape::new(vec![*kernel, *kernel, c, *filters]),
                        Shape::vector(*filters),
                    ],
                ))
            }
            Self::DepthwiseConv2d { kernel, stride, .. } => {
                let (h, w, c) = image_dims(input)?;
                check_window(*kernel, *stride)?;
                Ok((
                    Shape::image(h.div_ceil(*stride), w.div_ceil(*stride), c),
                    vec![Shape::new(vec![*kernel, *kernel, c]), Shape::vector(c)],
                ))
            }
            Self::Add => {
                if inputs[0] != inputs[1] {
                    return Err(format!(
                        "add operands differ: {} vs {}",
                        inputs[0], inputs[1]
                    ));
                }
                Ok((input.clone(), Vec::new()))
            }
            Self::GlobalAveragePool => {
                let (_, _, c) = image_dims(input)?;
                Ok((Shape::vector(c), Vec::new()))
            }
            Self::Dropout { rate } => {
                if !(0.0..1.0).contains(rate) {
                    return Err(format!("dropout rate {rate} outside [0, 1)"));
                }
                Ok((input.clone(), Vec::new()))
            }
            Self::Dense { units, .. } => {
                if input.rank() != 1 {
                    return Err(format!("dense expects a vector input, got {input}"));
                }
                if *units == 0 {
                    return Err("units must be positive".into());
                }
                let n = input.num_elements();
                Ok((
                    Shape::vector(*units),
                    vec![Shape::matrix(n, *units), Shape::vector(*units)],
                ))
            }
        }
    }
}

fn image_dims(shape: &Shape) -> Result<(usize, usize, usize), String> {
    match shape.dims() {
        &[h, w, c] => Ok((h, w, c)),
        _ => Err(format!("expected an [H, W, C] input, got {shape}")),
    }
}

fn check_window(kernel: usize, stride: usize) -> Result<(), String> {
    if kernel == 0 || stride == 0 {
        return Err(format!("kernel ({kernel}) and stride ({stride}) must be positive"));
    }
    Ok(())
}

/// A single layer of a classifier graph.
///
/// Weight shapes are fixed when the node is created; only their values can
/// change afterwards (see [`LayerNode::replace_weight_values`]).
#[derive(Debug, Clone, PartialEq)]
pub struct LayerNode {
    /// Unique layer name (e.g., `"block_2.depthwise"`).
    pub name: String,
    /// Structural role tag.
    pub role: LayerRole,
    /// Operation and hyper-parameters.
    pub op: LayerOp,
    /// Names of producing layers. Empty means "the previous layer", or the
    /// graph input for the first layer.
    pub inputs: Vec<String>,
    weights: Vec<Tensor>,
}

impl LayerNode {
    /// Creates a layer node.
    pub fn new(
        name: impl Into<String>,
        role: LayerRole,
        op: LayerOp,
        inputs: Vec<String>,
        weights: Vec<Tensor>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            op,
            inputs,
            weights,
        }
    }

    /// Returns the node's weight tensors in op order.
    pub fn weights(&self) -> &[Tensor] {
        &self.weights
    }

    /// Returns the node's weight shapes in op order.
    pub fn weight_shapes(&self) -> Vec<&Shape> {
        self.weights.iter().map(Tensor::shape).collect()
    }

    /// Returns `true` if `other` has exactly the same weight shapes.
    pub fn same_weight_shapes(&self, other: &[Tensor]) -> bool {
        self.weights.len() == other.len()
            && self
                .weights
                .iter()
                .zip(other)
                .all(|(a, b)| a.shape() == b.shape())
    }

    /// Overwrites weight values from `source`, leaving shapes untouched.
    ///
    /// # Errors
    /// Returns [`ModelError::WeightShapeChange`] (and leaves the node
    /// unchanged) if any source shape differs, or
    /// [`ModelError::InvalidLayer`] if the weight counts differ.
    pub fn replace_weight_values(&mut self, source: &[Tensor]) -> Result<(), ModelError> {
        if source.len() != self.weights.len() {
            return Err(ModelError::InvalidLayer {
                layer: self.name.clone(),
                detail: format!(
                    "expected {} weight tensors, got {}",
                    self.weights.len(),
                    source.len()
                ),
            });
        }
        for (index, (dst, src)) in self.weights.iter().zip(source).enumerate() {
            if dst.shape() != src.shape() {
                return Err(ModelError::WeightShapeChange {
                    layer: self.name.clone(),
                    index,
                    expected: dst.shape().clone(),
                    actual: src.shape().clone(),
                });
            }
        }
        for (dst, src) in self.weights.iter_mut().zip(source) {
            dst.as_mut_slice().copy_from_slice(src.as_slice());
        }
        Ok(())
    }

    /// Total number of scalar parameters.
    pub fn param_count(&self) -> usize {
        self.weights.iter().map(Tensor::num_elements).sum()
    }

    /// Weight footprint in bytes at `f32` precision.
    pub fn weight_bytes(&self) -> usize {
        self.param_count() * std::mem::size_of::<f32>()
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        let shapes: Vec<String> = self.weights.iter().map(|w| w.shape().to_string()).collect();
        format!(
            "{} <{}> {}: {} params {}",
            self.name,
            self.role,
            self.op.kind(),
            self.param_count(),
            if shapes.is_empty() {
                String::new()
            } else {
                shapes.join(" ")
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_node(n: usize, units: usize) -> LayerNode {
        LayerNode::new(
            "head.dense",
            LayerRole::Dense,
            LayerOp::Dense {
                units,
                activation: Activation::Relu,
            },
            vec![],
            vec![
                Tensor::zeros(Shape::matrix(n, units)),
                Tensor::zeros(Shape::vector(units)),
            ],
        )
    }

    #[test]
    fn test_role_is_head() {
        assert!(!LayerRole::Backbone.is_head());
        assert!(LayerRole::Pooling.is_head());
        assert!(LayerRole::Output.is_head());
    }

    #[test]
    fn test_op_serde_tagged() {
        let json = r#"{ "type": "conv2d", "kernel": 3, "stride": 2, "filters": 16, "activation": "relu6" }"#;
        let op: LayerOp = serde_json::from_str(json).unwrap();
        assert_eq!(
            op,
            LayerOp::Conv2d {
                kernel: 3,
                stride: 2,
                filters: 16,
                activation: Activation::Relu6
            }
        );

        let pool: LayerOp = serde_json::from_str(r#"{ "type": "global_average_pool" }"#).unwrap();
        assert_eq!(pool, LayerOp::GlobalAveragePool);
    }

    #[test]
    fn test_unknown_op_rejected() {
        let result: Result<LayerOp, _> = serde_json::from_str(r#"{ "type": "lstm" }"#);
        assert!(result.is_err());
        let role: Result<LayerRole, _> = serde_json::from_str(r#""attention""#);
        assert!(role.is_err());
    }

    #[test]
    fn test_infer_conv() {
        let op = LayerOp::Conv2d {
            kernel: 3,
            stride: 2,
            filters: 8,
            activation: Activation::Relu6,
        };
        let input = Shape::image(15, 16, 3);
        let (out, weights) = op.infer(&[&input]).unwrap();
        assert_eq!(out, Shape::image(8, 8, 8));
        assert_eq!(weights, vec![Shape::new(vec![3, 3, 3, 8]), Shape::vector(8)]);
    }

    #[test]
    fn test_infer_dense_requires_vector() {
        let op = LayerOp::Dense {
            units: 4,
            activation: Activation::Linear,
        };
        assert!(op.infer(&[&Shape::image(2, 2, 2)]).is_err());
        let (out, weights) = op.infer(&[&Shape::vector(10)]).unwrap();
        assert_eq!(out, Shape::vector(4));
        assert_eq!(weights[0], Shape::matrix(10, 4));
    }

    #[test]
    fn test_infer_add_and_dropout() {
        let a = Shape::image(4, 4, 8);
        let b = Shape::image(4, 4, 4);
        assert!(LayerOp::Add.infer(&[&a, &b]).is_err());
        assert!(LayerOp::Add.infer(&[&a]).is_err());
        assert!(LayerOp::Dropout { rate: 1.0 }.infer(&[&a]).is_err());
        assert_eq!(LayerOp::Dropout { rate: 0.2 }.infer(&[&a]).unwrap().0, a);
    }

    #[test]
    fn test_role_op_compatibility() {
        assert!(LayerOp::Add.allowed_for(LayerRole::Backbone));
        assert!(!LayerOp::Add.allowed_for(LayerRole::Dense));
        assert!(LayerOp::GlobalAveragePool.allowed_for(LayerRole::Pooling));
        assert!(!LayerOp::GlobalAveragePool.allowed_for(LayerRole::Backbone));
    }

    #[test]
    fn test_replace_weight_values() {
        let mut node = dense_node(3, 2);
        let src = vec![
            Tensor::full(Shape::matrix(3, 2), 0.5),
            Tensor::full(Shape::vector(2), 1.0),
        ];
        node.replace_weight_values(&src).unwrap();
        assert_eq!(node.weights(), &src[..]);
    }

    #[test]
    fn test_replace_weight_values_rejects_shape_change() {
        let mut node = dense_node(3, 2);
        let before = node.clone();
        let src = vec![
            Tensor::full(Shape::matrix(3, 4), 0.5),
            Tensor::full(Shape::vector(4), 1.0),
        ];
        assert!(matches!(
            node.replace_weight_values(&src),
            Err(ModelError::WeightShapeChange { index: 0, .. })
        ));
        assert_eq!(node, before);
    }

    #[test]
    fn test_param_count_and_summary() {
        let node = dense_node(3, 2);
        assert_eq!(node.param_count(), 8);
        assert_eq!(node.weight_bytes(), 32);
        let s = node.summary();
        assert!(s.contains("head.dense"));
        assert!(s.contains("<dense>"));
    }
}
