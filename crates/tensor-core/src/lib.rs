// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Lightweight tensor types and operations for converting and checking
//! image-classification models on edge targets.
//!
//! This crate provides:
//! - [`Tensor`]: an owned, row-major `f32` tensor with an implicit batch of 1.
//! - [`Shape`]: runtime shape descriptors (`[H, W, C]` for images).
//! - [`DType`]: storage encodings used by serialized artifacts (f32, f16, i8).
//! - Inference operations: convolution, depthwise convolution, pooling,
//!   dense projection, activations, element-wise add and softmax.
//! - [`quant`]: f16 and symmetric int8 codecs for weight storage.
//!
//! # Design Goals
//! - Every operation validates shapes and returns a [`TensorError`] instead
//!   of panicking.
//! - Deterministic results: no threading, no fast-math reordering.

mod dtype;
mod error;
mod ops;
pub mod quant;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use ops::{
    add, conv2d, dense, depthwise_conv2d, global_avg_pool, matmul, relu, relu6, softmax,
};
pub use shape::Shape;
pub use tensor::Tensor;
