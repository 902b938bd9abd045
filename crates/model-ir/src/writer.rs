// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Exports a validated graph as a model directory (`model.json` +
//! `model.safetensors`) that [`ModelLoader`](crate::ModelLoader) can read
//! back.
//!
//! An inference-only export drops dropout layers and rewires any edge that
//! pointed at a dropped layer to that layer's own source.

use crate::graph::Validated;
use crate::loader::{MANIFEST_FILE, WEIGHTS_FILE};
use crate::manifest::{ManifestLayer, FORMAT_VERSION};
use crate::{ExportError, LayerOp, ModelGraph, ModelManifest};
use std::collections::HashMap;
use std::path::Path;

/// Writes model directories.
pub struct ModelWriter;

impl ModelWriter {
    /// Builds the manifest describing `graph`.
    pub fn manifest(
        graph: &ModelGraph<Validated>,
        inference_only: bool,
    ) -> Result<ModelManifest, ExportError> {
        // Dropped layer name -> the layer it forwarded (None = graph input).
        let mut alias: HashMap<&str, Option<String>> = HashMap::new();
        let resolve = |alias: &HashMap<&str, Option<String>>, name: &str| match alias.get(name) {
            Some(target) => target.clone(),
            None => Some(name.to_string()),
        };

        let mut layers: Vec<ManifestLayer> = Vec::with_capacity(graph.num_nodes());
        // What an implicit "previous layer" edge currently resolves to.
        let mut previous: Option<String> = None;

        for node in graph.iter_nodes() {
            if inference_only && matches!(node.op, LayerOp::Dropout { .. }) {
                let source = match node.inputs.first() {
                    Some(name) => resolve(&alias, name),
                    None => previous.clone(),
                };
                alias.insert(node.name.as_str(), source.clone());
                previous = source;
                continue;
            }

            let last_written = layers.last().map(|l| l.name.clone());
            let inputs = if node.inputs.is_empty() {
                if previous == last_written {
                    Vec::new()
                } else {
                    match &previous {
                        Some(name) => vec![name.clone()],
                        None => {
                            return Err(ExportError::Unsupported(format!(
                                "layer '{}' would read the graph input after dropout removal",
                                node.name
                            )))
                        }
                    }
                }
            } else {
                node.inputs
                    .iter()
                    .map(|name| {
                        resolve(&alias, name).ok_or_else(|| {
                            ExportError::Unsupported(format!(
                                "layer '{}' input '{name}' resolves to the graph input",
                                node.name
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            };

            layers.push(ManifestLayer {
                name: node.name.clone(),
                role: node.role,
                op: node.op.clone(),
                inputs,
                weights: weight_names(&node.name, &node.op),
            });
            previous = Some(node.name.clone());
        }

        Ok(ModelManifest {
            format_version: FORMAT_VERSION,
            name: graph.name.clone(),
            input_shape: graph.input_shape().clone(),
            num_classes: graph.num_classes(),
            layers,
        })
    }

    /// Writes `graph` into `dir`, creating it if needed.
    ///
    /// Weights are stored as little-endian `f32`.
    pub fn write(
        graph: &ModelGraph<Validated>,
        dir: &Path,
        inference_only: bool,
    ) -> Result<ModelManifest, ExportError> {
        let manifest = Self::manifest(graph, inference_only)?;
        std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        // Owned byte buffers first; views borrow them.
        let mut entries: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::new();
        let kept: HashMap<&str, &ManifestLayer> =
            manifest.layers.iter().map(|l| (l.name.as_str(), l)).collect();
        for node in graph.iter_nodes() {
            let Some(layer) = kept.get(node.name.as_str()) else {
                continue;
            };
            for (name, tensor) in layer.weights.iter().zip(node.weights()) {
                let bytes = tensor.as_slice().iter().flat_map(|v| v.to_le_bytes()).collect();
                entries.push((name.clone(), tensor.shape().dims().to_vec(), bytes));
            }
        }

        let views = entries
            .iter()
            .map(|(name, shape, bytes)| {
                safetensors::tensor::TensorView::new(safetensors::Dtype::F32, shape.clone(), bytes)
                    .map(|view| (name.clone(), view))
                    .map_err(|e| ExportError::Serialize(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let encoded = safetensors::serialize(views, &None)
            .map_err(|e| ExportError::Serialize(e.to_string()))?;

        let weights_path = dir.join(WEIGHTS_FILE);
        std::fs::write(&weights_path, encoded).map_err(|source| ExportError::Io {
            path: weights_path.clone(),
            source,
        })?;

        let manifest_path = dir.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, manifest.to_json()?).map_err(|source| ExportError::Io {
            path: manifest_path.clone(),
            source,
        })?;

        tracing::debug!(
            model = %manifest.name,
            layers = manifest.layers.len(),
            inference_only,
            "exported model to {}",
            dir.display()
        );
        Ok(manifest)
    }
}

fn weight_names(layer: &str, op: &LayerOp) -> Vec<String> {
    op.weight_suffixes()
        .iter()
        .map(|suffix| format!("{layer}.{suffix}"))
        .collect()
}
