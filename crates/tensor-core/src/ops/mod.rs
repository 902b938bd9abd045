// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor operations for convolutional classifiers.
//!
//! Image tensors are `[H, W, C]`. Convolutions use TensorFlow-style `same`
//! padding: `out = ceil(in / stride)`, with the extra padding row/column
//! placed at the bottom/right.

mod activation_op;
mod conv_op;
mod dense_op;
mod matmul_op;
mod pool_op;
mod softmax_op;

pub use activation_op::{add, relu, relu6};
pub use conv_op::{conv2d, depthwise_conv2d};
pub use dense_op::dense;
pub use matmul_op::matmul;
pub use pool_op::global_avg_pool;
pub use softmax_op::softmax;
