// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON model manifest parsing.
//!
//! The manifest (`model.json`) describes the classifier's layers and maps
//! each layer's weights to tensor names in the SafeTensors file.
//!
//! # Format
//! ```json
//! {
//!   "format_version": 1,
//!   "name": "food_classifier",
//!   "input_shape": [224, 224, 3],
//!   "num_classes": 20,
//!   "layers": [
//!     {
//!       "name": "stem",
//!       "role": "backbone",
//!       "op": { "type": "conv2d", "kernel": 3, "stride": 2, "filters": 16, "activation": "relu6" },
//!       "inputs": [],
//!       "weights": ["stem.kernel", "stem.bias"]
//!     },
//!     ...
//!   ]
//! }
//! ```

use crate::{LayerOp, LayerRole, LoadError};
use std::collections::HashSet;
use std::path::Path;
use tensor_core::Shape;

/// The only manifest format version this crate reads and writes.
pub const FORMAT_VERSION: u32 = 1;

/// Top-level model manifest, deserialized from `model.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub format_version: u32,
    /// Human-readable model name.
    pub name: String,
    /// `[H, W, C]`; the batch dimension is implicit.
    pub input_shape: Shape,
    pub num_classes: usize,
    /// Layers in execution order.
    pub layers: Vec<ManifestLayer>,
}

/// A single layer entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestLayer {
    pub name: String,
    pub role: LayerRole,
    pub op: LayerOp,
    /// Producing layers; empty means the previous layer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// Weight tensor names in the SafeTensors file, in op order.
    #[serde(default)]
    pub weights: Vec<String>,
}

impl ModelManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::MissingFile {
                    path: path.to_path_buf(),
                }
            } else {
                LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encodes the manifest as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validates that the manifest is internally consistent.
    ///
    /// Checks:
    /// - The format version is supported.
    /// - At least one layer is defined.
    /// - No duplicate layer names.
    /// - Each layer lists exactly as many weights as its op consumes.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.format_version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion {
                found: self.format_version,
                supported: FORMAT_VERSION,
            });
        }

        if self.layers.is_empty() {
            return Err(LoadError::InvalidManifest("manifest contains no layers".into()));
        }

        let mut seen_names = HashSet::new();
        for layer in &self.layers {
            if !seen_names.insert(layer.name.as_str()) {
                return Err(LoadError::InvalidManifest(format!(
                    "duplicate layer name '{}'",
                    layer.name
                )));
            }
            let expected = layer.op.weight_count();
            if layer.weights.len() != expected {
                return Err(LoadError::InvalidManifest(format!(
                    "layer '{}' ({}) lists {} weights, expected {expected}",
                    layer.name,
                    layer.op.kind(),
                    layer.weights.len()
                )));
            }
        }

        Ok(())
    }

    /// Returns the total number of unique weight tensor names across all layers.
    pub fn total_weight_count(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| l.weights.iter().map(String::as_str))
            .collect::<HashSet<_>>()
            .len()
    }
}
