// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! A lightweight intermediate representation for image classifiers: a
//! convolutional backbone followed by a small classification head.
//!
//! - [`LayerNode`]: one layer: explicit [`LayerRole`], typed [`LayerOp`]
//!   and owned `f32` weights whose shapes are fixed at construction.
//! - [`ModelGraph`]: ordered layers + input shape + class count, with a
//!   **type-state pattern** (`Loaded` → `Validated`).
//! - [`ArchitectureDescriptor`]: the expected inference architecture.
//! - [`LabelSet`]: ordered, unique class names.
//! - [`ModelLoader`] / [`ModelWriter`]: read and write model directories
//!   (JSON manifest + SafeTensors weights).
//! - [`backbone`]: fresh, deterministically initialised graphs.
//! - A reference forward pass ([`ModelGraph::forward`]).
//!
//! # Supported Model Format
//! A model is stored as:
//! - `model.json`: manifest describing layers, roles, ops and weight names.
//! - `model.safetensors`: weights in SafeTensors format.
//!
//! # Example
//! ```no_run
//! use model_ir::ModelLoader;
//! use std::path::Path;
//!
//! let graph = ModelLoader::load(Path::new("./models/food_classifier")).unwrap();
//! println!("{}", graph.summary());
//! for node in graph.iter_nodes() {
//!     println!("  {}", node.summary());
//! }
//! ```

pub mod backbone;
mod descriptor;
mod error;
mod exec;
pub mod graph;
mod layer;
mod loader;
mod manifest;
mod writer;

pub use backbone::{BackboneKind, BackboneSpec};
pub use descriptor::{ArchitectureDescriptor, HeadLayer, LabelSet};
pub use error::{ExportError, LoadError, ModelError};
pub use exec::{apply_activation, synthetic_input};
pub use graph::{GraphState, Loaded, ModelGraph, Validated};
pub use layer::{Activation, LayerNode, LayerOp, LayerRole};
pub use loader::{ModelLoader, MANIFEST_FILE, WEIGHTS_FILE};
pub use manifest::{ManifestLayer, ModelManifest, FORMAT_VERSION};
pub use writer::ModelWriter;
