// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Conversion paths.
//!
//! - [`DirectPath`]: converts the reconciled in-memory graph.
//! - [`IntermediatePath`]: exports the graph as an inference-only model
//!   directory, reloads it and converts the reloaded graph. The scratch
//!   directory is removed afterwards, whatever the result.

use crate::report::PipelineState;
use crate::PathError;
use converter::{CalibrationSource, Conversion, ConversionConfig, Converter};
use model_ir::{ModelGraph, ModelLoader, ModelWriter, Validated};
use std::path::{Component, Path, PathBuf};

/// What a path needs to run a conversion.
pub struct PathContext<'a> {
    pub converter: &'a Converter,
    pub configs: &'a [ConversionConfig],
    pub calibration: &'a mut dyn CalibrationSource,
}

/// A route from a reconciled graph to an artifact.
pub trait ConversionPath {
    /// Returns the name of this path (for logging).
    fn name(&self) -> &'static str;

    /// Converts `graph`, calling `enter` for every pipeline state the path
    /// passes through.
    fn run(
        &self,
        graph: &ModelGraph<Validated>,
        ctx: &mut PathContext<'_>,
        enter: &mut dyn FnMut(PipelineState),
    ) -> Result<Conversion, PathError>;
}

/// Converts the graph as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPath;

impl ConversionPath for DirectPath {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn run(
        &self,
        graph: &ModelGraph<Validated>,
        ctx: &mut PathContext<'_>,
        enter: &mut dyn FnMut(PipelineState),
    ) -> Result<Conversion, PathError> {
        enter(PipelineState::Converting);
        Ok(ctx.converter.convert(graph, ctx.configs, &mut *ctx.calibration)?)
    }
}

/// Converts from a freshly written and reloaded inference-only model.
#[derive(Debug, Clone)]
pub struct IntermediatePath {
    scratch_root: PathBuf,
}

impl IntermediatePath {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    /// Directory the intermediate model of `model` is written to.
    ///
    /// Model names come from the manifest, so a name that is not a single
    /// plain path component falls back to `model` and the directory always
    /// stays under the scratch root.
    pub fn scratch_dir(&self, model: &str) -> PathBuf {
        let mut components = Path::new(model).components();
        let name = match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => name.to_string_lossy().into_owned(),
            _ => "model".to_owned(),
        };
        self.scratch_root.join(format!("{name}.intermediate"))
    }
}

/// Removes its directory when dropped.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn claim(path: PathBuf) -> Self {
        // Leftovers of an interrupted run.
        if path.exists() {
            remove(&path);
        }
        Self(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        remove(&self.0);
    }
}

fn remove(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => tracing::debug!("removed scratch directory {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("cannot remove scratch directory {}: {e}", path.display()),
    }
}

impl ConversionPath for IntermediatePath {
    fn name(&self) -> &'static str {
        "intermediate"
    }

    fn run(
        &self,
        graph: &ModelGraph<Validated>,
        ctx: &mut PathContext<'_>,
        enter: &mut dyn FnMut(PipelineState),
    ) -> Result<Conversion, PathError> {
        enter(PipelineState::Loading);
        let scratch = ScratchDir::claim(self.scratch_dir(&graph.name));
        let manifest = ModelWriter::write(graph, &scratch.0, true)?;
        tracing::info!(
            layers = manifest.layers.len(),
            "intermediate model written to {}",
            scratch.0.display()
        );
        let reloaded = ModelLoader::load(&scratch.0)?;

        enter(PipelineState::Converting);
        Ok(ctx
            .converter
            .convert(&reloaded, ctx.configs, &mut *ctx.calibration)?)
    }
}
