// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model loading from manifest + SafeTensors files.
//!
//! The loader reads a model directory containing:
//! - `model.json`: the layer manifest (see [`ModelManifest`]).
//! - `model.safetensors`: the weights in SafeTensors format (f32 or f16).
//!
//! The weight file is memory-mapped read-only; the source directory is
//! never written. Decoded weights are held as `f32` tensors inside the
//! graph's layer nodes.

use crate::graph::Validated;
use crate::{LayerNode, LoadError, ModelGraph, ModelManifest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tensor_core::{quant, DType, Shape, Tensor};

/// Default manifest filename.
pub const MANIFEST_FILE: &str = "model.json";

/// Default SafeTensors filename.
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Loads a model directory into a validated [`ModelGraph`].
///
/// # Example
/// ```no_run
/// use model_ir::ModelLoader;
/// use std::path::Path;
///
/// let graph = ModelLoader::load(Path::new("./models/food_classifier")).unwrap();
/// println!("{}", graph.summary());
/// ```
pub struct ModelLoader;

impl ModelLoader {
    /// Loads and validates a model from the given directory.
    ///
    /// Steps:
    /// 1. Parse and validate `model.json`.
    /// 2. Decode every referenced tensor from `model.safetensors`.
    /// 3. Build [`LayerNode`]s and validate the assembled graph, which
    ///    checks every weight shape against its op.
    pub fn load(model_dir: &Path) -> Result<ModelGraph<Validated>, LoadError> {
        let manifest = Self::load_manifest(model_dir)?;
        let weights = Self::read_weights(&model_dir.join(WEIGHTS_FILE), &manifest)?;
        let graph = Self::from_manifest_and_weights(&manifest, &weights)?;
        tracing::info!(
            model = %graph.name,
            layers = graph.num_nodes(),
            params = graph.param_count(),
            "loaded model from {}",
            model_dir.display()
        );
        Ok(graph)
    }

    /// Parses and validates the manifest in `model_dir`.
    pub fn load_manifest(model_dir: &Path) -> Result<ModelManifest, LoadError> {
        let manifest = ModelManifest::from_file(&model_dir.join(MANIFEST_FILE))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Builds a graph from a manifest and already-decoded weights.
    ///
    /// Useful for testing without actual SafeTensors files.
    pub fn from_manifest_and_weights(
        manifest: &ModelManifest,
        weights: &HashMap<String, Tensor>,
    ) -> Result<ModelGraph<Validated>, LoadError> {
        manifest.validate()?;

        let mut nodes = Vec::with_capacity(manifest.layers.len());
        for ml in &manifest.layers {
            let tensors = ml
                .weights
                .iter()
                .map(|wname| {
                    weights
                        .get(wname)
                        .cloned()
                        .ok_or_else(|| LoadError::WeightNotFound {
                            layer: ml.name.clone(),
                            name: wname.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            nodes.push(LayerNode::new(
                ml.name.clone(),
                ml.role,
                ml.op.clone(),
                ml.inputs.clone(),
                tensors,
            ));
        }

        let graph = ModelGraph::new(
            manifest.name.clone(),
            manifest.input_shape.clone(),
            manifest.num_classes,
            nodes,
        );
        Ok(graph.validate()?)
    }

    /// Combined on-disk size of the manifest and weight file.
    pub fn source_size_bytes(model_dir: &Path) -> Result<u64, LoadError> {
        let mut total = 0;
        for file in [MANIFEST_FILE, WEIGHTS_FILE] {
            let path = model_dir.join(file);
            total += std::fs::metadata(&path)
                .map_err(|source| io_error(path, source))?
                .len();
        }
        Ok(total)
    }

    /// Decodes every tensor the manifest references.
    fn read_weights(
        weights_path: &Path,
        manifest: &ModelManifest,
    ) -> Result<HashMap<String, Tensor>, LoadError> {
        let file = std::fs::File::open(weights_path)
            .map_err(|source| io_error(weights_path.to_path_buf(), source))?;

        // SAFETY: the mapping is read-only and dropped before this returns.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|source| io_error(weights_path.to_path_buf(), source))?;

        let tensors = safetensors::SafeTensors::deserialize(&mmap)
            .map_err(|e| LoadError::Weights(format!("SafeTensors parse error: {e}")))?;

        let mut out = HashMap::new();
        for layer in &manifest.layers {
            for name in &layer.weights {
                if out.contains_key(name) {
                    continue;
                }
                let view = tensors.tensor(name).map_err(|_| LoadError::WeightNotFound {
                    layer: layer.name.clone(),
                    name: name.clone(),
                })?;
                let dtype = convert_safetensor_dtype(name, view.dtype())?;
                let shape = Shape::new(view.shape().to_vec());
                let values = quant::decode(view.data(), dtype, None, shape.num_elements())
                    .map_err(|e| LoadError::Weights(format!("tensor '{name}': {e}")))?;
                let tensor = Tensor::from_vec(shape, values)
                    .map_err(|e| LoadError::Weights(format!("tensor '{name}': {e}")))?;
                tracing::debug!(tensor = %name, shape = %tensor.shape(), %dtype, "decoded weight");
                out.insert(name.clone(), tensor);
            }
        }

        Ok(out)
    }
}

fn io_error(path: PathBuf, source: std::io::Error) -> LoadError {
    if source.kind() == std::io::ErrorKind::NotFound {
        LoadError::MissingFile { path }
    } else {
        LoadError::Io { path, source }
    }
}

/// Converts a SafeTensors `Dtype` to our [`DType`]. Only float weights are
/// accepted from training checkpoints.
fn convert_safetensor_dtype(name: &str, st_dtype: safetensors::Dtype) -> Result<DType, LoadError> {
    match st_dtype {
        safetensors::Dtype::F32 => Ok(DType::F32),
        safetensors::Dtype::F16 => Ok(DType::F16),
        other => Err(LoadError::UnsupportedDtype {
            name: name.to_string(),
            dtype: format!("{other:?}"),
        }),
    }
}
