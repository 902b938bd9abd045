// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph construction, loading and export.

use std::path::PathBuf;
use tensor_core::{Shape, TensorError};

/// Errors raised by the in-memory graph: validation and execution.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A layer definition is invalid (e.g., wrong weight shape, bad edge).
    #[error("invalid layer '{layer}': {detail}")]
    InvalidLayer { layer: String, detail: String },

    /// The model graph is malformed as a whole.
    #[error("invalid model graph: {0}")]
    InvalidGraph(String),

    /// Replacing weight values would change a weight's shape.
    #[error("layer '{layer}' weight {index}: shape {expected} cannot become {actual}")]
    WeightShapeChange {
        layer: String,
        index: usize,
        expected: Shape,
        actual: Shape,
    },

    /// The forward-pass input does not match the graph's input shape.
    #[error("input shape mismatch: graph expects {expected}, got {actual}")]
    InputShape { expected: Shape, actual: Shape },

    /// A tensor kernel failed while executing a layer.
    #[error("layer '{layer}' failed: {source}")]
    Execution {
        layer: String,
        #[source]
        source: TensorError,
    },

    /// A descriptor or label set is inconsistent.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Errors raised while loading a model directory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A required file does not exist.
    #[error("missing model file: {}", path.display())]
    MissingFile { path: PathBuf },

    /// A file exists but could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest JSON is malformed or names an unknown role/op.
    #[error("corrupt manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// The manifest declares a format version this loader does not read.
    #[error("unsupported manifest format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The manifest is well-formed JSON but internally inconsistent.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// The SafeTensors file is corrupt.
    #[error("corrupt weight file: {0}")]
    Weights(String),

    /// A weight tensor referenced in the manifest was not found.
    #[error("layer '{layer}' references missing weight tensor '{name}'")]
    WeightNotFound { layer: String, name: String },

    /// A weight tensor uses an element type the loader cannot decode.
    #[error("weight tensor '{name}' has unsupported dtype {dtype}")]
    UnsupportedDtype { name: String, dtype: String },

    /// The assembled graph failed validation.
    #[error(transparent)]
    Graph(#[from] ModelError),
}

/// Errors raised while exporting a graph to a model directory.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Writing a file failed.
    #[error("cannot write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Weight serialization failed.
    #[error("weight serialization failed: {0}")]
    Serialize(String),

    /// The manifest could not be encoded.
    #[error("manifest encoding failed: {0}")]
    Manifest(#[from] serde_json::Error),

    /// The graph cannot be expressed in the requested export form.
    #[error("cannot export graph: {0}")]
    Unsupported(String),
}
