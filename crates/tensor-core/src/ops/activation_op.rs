// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise activations and residual addition.

use crate::{Tensor, TensorError};

/// Upper clamp of ReLU6.
const RELU6_CAP: f32 = 6.0;

/// Applies `max(x, 0)` in place.
pub fn relu(tensor: &mut Tensor) {
    for x in tensor.as_mut_slice() {
        *x = x.max(0.0);
    }
}

/// Applies `min(max(x, 0), 6)` in place.
pub fn relu6(tensor: &mut Tensor) {
    for x in tensor.as_mut_slice() {
        *x = x.clamp(0.0, RELU6_CAP);
    }
}

/// Element-wise sum of two tensors with identical shapes.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if the shapes differ.
pub fn add(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor, TensorError> {
    if lhs.shape() != rhs.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "add",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }

    let data = lhs
        .as_slice()
        .iter()
        .zip(rhs.as_slice())
        .map(|(a, b)| a + b)
        .collect();
    Tensor::from_vec(lhs.shape().clone(), data)
}
