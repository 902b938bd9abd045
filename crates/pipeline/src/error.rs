// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the pipeline.

use converter::{ConversionError, InterpreterError};
use model_ir::{ExportError, LoadError, ModelError};
use std::path::PathBuf;
use tensor_core::Shape;

/// Errors that stop a pipeline from being built or from producing an
/// artifact.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configuration is unreadable or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model loading failed: {0}")]
    Load(#[from] LoadError),

    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] reconciler::ReconcileError),

    #[error("conversion path failed: {0}")]
    Path(#[from] PathError),
}

/// Failure of a conversion path before or during conversion.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("cannot export intermediate model: {0}")]
    Export(#[from] ExportError),

    #[error("cannot reload intermediate model: {0}")]
    Load(#[from] LoadError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Numeric validation could not produce a report.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("artifact could not be run: {0}")]
    Interpreter(#[from] InterpreterError),

    #[error("reference forward pass failed: {0}")]
    Reference(#[from] ModelError),

    #[error("output shape {actual} does not match the {labels} labels (expected {expected})")]
    OutputShape {
        expected: Shape,
        actual: Shape,
        labels: usize,
    },
}

/// Failure to place deployment assets.
#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error("deployment source {0} does not exist")]
    MissingSource(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
