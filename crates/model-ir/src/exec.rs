// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference forward pass over a validated graph.
//!
//! Execution is single-threaded and deterministic: the same graph and the
//! same input always produce bit-identical output.

use crate::graph::{ModelGraph, Source, Validated};
use crate::{Activation, LayerNode, LayerOp, ModelError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tensor_core::{
    add, conv2d, dense, depthwise_conv2d, global_avg_pool, relu, relu6, softmax, Shape, Tensor,
    TensorError,
};

/// Applies a fused activation in place.
pub fn apply_activation(tensor: &mut Tensor, activation: Activation) -> Result<(), TensorError> {
    match activation {
        Activation::Linear => {}
        Activation::Relu => relu(tensor),
        Activation::Relu6 => relu6(tensor),
        Activation::Softmax => {
            let mut out = Tensor::zeros(tensor.shape().clone());
            softmax(tensor, &mut out)?;
            *tensor = out;
        }
    }
    Ok(())
}

/// Deterministic synthetic input: uniform `[0, 1)` values from a seeded RNG.
pub fn synthetic_input(shape: &Shape, seed: u64) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = Tensor::zeros(shape.clone());
    for v in t.as_mut_slice() {
        *v = rng.random::<f32>();
    }
    t
}

fn run_node(node: &LayerNode, args: &[&Tensor]) -> Result<Tensor, TensorError> {
    let w = node.weights();
    match &node.op {
        LayerOp::Conv2d {
            stride, activation, ..
        } => {
            let mut out = conv2d(args[0], &w[0], &w[1], *stride)?;
            apply_activation(&mut out, *activation)?;
            Ok(out)
        }
        LayerOp::DepthwiseConv2d {
            stride, activation, ..
        } => {
            let mut out = depthwise_conv2d(args[0], &w[0], &w[1], *stride)?;
            apply_activation(&mut out, *activation)?;
            Ok(out)
        }
        LayerOp::Add => add(args[0], args[1]),
        LayerOp::GlobalAveragePool => global_avg_pool(args[0]),
        // Identity at inference time.
        LayerOp::Dropout { .. } => Ok(args[0].clone()),
        LayerOp::Dense { activation, .. } => {
            let mut out = dense(args[0], &w[0], &w[1])?;
            apply_activation(&mut out, *activation)?;
            Ok(out)
        }
    }
}

impl ModelGraph<Validated> {
    /// Runs a forward pass and returns the output layer's activations.
    ///
    /// # Errors
    /// Returns [`ModelError::InputShape`] if `input` does not match the
    /// graph's input shape, or [`ModelError::Execution`] if a kernel fails.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        self.forward_observed(input, |_, _| {})
    }

    /// Like [`forward`](Self::forward), calling `observe` with every
    /// layer's output as it is produced.
    pub fn forward_observed<F>(&self, input: &Tensor, mut observe: F) -> Result<Tensor, ModelError>
    where
        F: FnMut(&LayerNode, &Tensor),
    {
        if input.shape() != self.input_shape() {
            return Err(ModelError::InputShape {
                expected: self.input_shape().clone(),
                actual: input.shape().clone(),
            });
        }

        let mut outputs: Vec<Tensor> = Vec::with_capacity(self.num_nodes());
        for (node, plan) in self.nodes().iter().zip(&self.plan) {
            let args: Vec<&Tensor> = plan
                .sources
                .iter()
                .map(|s| match *s {
                    Source::GraphInput => input,
                    Source::Node(j) => &outputs[j],
                })
                .collect();

            let out = run_node(node, &args).map_err(|source| ModelError::Execution {
                layer: node.name.clone(),
                source,
            })?;
            observe(node, &out);
            outputs.push(out);
        }

        outputs
            .pop()
            .ok_or_else(|| ModelError::InvalidGraph("model graph contains no layers".into()))
    }
}
