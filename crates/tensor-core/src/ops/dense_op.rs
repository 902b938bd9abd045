// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully connected projection.

use crate::{matmul, Shape, Tensor, TensorError};

/// Computes `input @ weight + bias`.
///
/// - `input`: `[N]` (any rank is accepted and flattened)
/// - `weight`: `[N, U]`
/// - `bias`: `[U]`
///
/// Returns a `[U]` vector.
pub fn dense(input: &Tensor, weight: &Tensor, bias: &Tensor) -> Result<Tensor, TensorError> {
    let n = input.num_elements();
    let units = match weight.shape().dims() {
        &[rows, cols] if rows == n => cols,
        _ => {
            return Err(TensorError::ShapeMismatch {
                op: "dense (weight)",
                lhs: input.shape().clone(),
                rhs: weight.shape().clone(),
            })
        }
    };
    if bias.shape() != &Shape::vector(units) {
        return Err(TensorError::ShapeMismatch {
            op: "dense (bias)",
            lhs: Shape::vector(units),
            rhs: bias.shape().clone(),
        });
    }

    let row = input.clone().reshape(Shape::matrix(1, n))?;
    let mut out = Tensor::zeros(Shape::matrix(1, units));
    matmul(&row, weight, &mut out)?;

    for (o, &b) in out.as_mut_slice().iter_mut().zip(bias.as_slice()) {
        *o += b;
    }
    out.reshape(Shape::vector(units))
}
