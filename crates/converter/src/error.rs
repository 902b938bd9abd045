// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for conversion, artifact decoding and artifact execution.

use crate::catalog::Provider;
use crate::config::Representation;
use crate::lowering::TargetOpKind;
use std::path::PathBuf;
use tensor_core::{Shape, TensorError};

/// One configuration that the converter tried and rejected.
#[derive(Debug)]
pub struct RejectedAttempt {
    /// Name of the rejected configuration.
    pub config: String,
    pub error: AttemptError,
}

impl std::fmt::Display for RejectedAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}': {}", self.config, self.error)
    }
}

/// Returned only when every configuration was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("all {} conversion configurations were rejected{}", .attempts.len(), list(.attempts))]
    Exhausted { attempts: Vec<RejectedAttempt> },
}

impl ConversionError {
    /// The rejected attempts, in the order they were tried.
    pub fn attempts(&self) -> &[RejectedAttempt] {
        match self {
            Self::Exhausted { attempts } => attempts,
        }
    }
}

fn list(attempts: &[RejectedAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("\n  - {a}"))
        .collect()
}

/// Why a single configuration was rejected.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("operator {0} is not known to the target")]
    UnknownOperator(TargetOpKind),

    #[error("operator {op} needs {provider} which this configuration does not enable")]
    OperatorUnavailable { op: TargetOpKind, provider: Provider },

    #[error("operator {op} has no {representation} kernel on the target")]
    ReducedPrecisionUnsupported {
        op: TargetOpKind,
        representation: Representation,
    },

    #[error("calibration sample {sample} unusable: {detail}")]
    Calibration { sample: usize, detail: String },

    #[error("calibration pass on sample {sample} failed: {source}")]
    CalibrationPass {
        sample: usize,
        #[source]
        source: ExecError,
    },

    #[error("activation of '{op}' reaches {max_abs}, beyond the float16 range")]
    ActivationOverflow { op: String, max_abs: f32 },

    #[error("cannot encode weights of '{op}': {source}")]
    Encode {
        op: String,
        #[source]
        source: TensorError,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Failure raised by a [`CalibrationSource`](crate::CalibrationSource).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CalibrationError(pub String);

/// Failure while executing a lowered program.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("input shape {actual} does not match expected {expected}")]
    InputShape { expected: Shape, actual: Shape },

    #[error("operator '{op}' failed: {source}")]
    Op {
        op: String,
        #[source]
        source: TensorError,
    },
}

/// Malformed or unreadable artifact bytes.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not an artifact (bad magic bytes)")]
    BadMagic,

    #[error("unsupported artifact version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("artifact truncated: {0}")]
    Truncated(String),

    #[error("artifact header: {0}")]
    Header(#[from] serde_json::Error),

    #[error("invalid artifact layout: {0}")]
    Layout(String),

    #[error("cannot decode tensor '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: TensorError,
    },
}

/// Failure to load or run an artifact.
#[derive(Debug, thiserror::Error)]
pub enum InterpreterError {
    #[error("operator {op} ('{layer}') needs {provider}, which the runtime does not provide")]
    UnsupportedOperator {
        layer: String,
        op: TargetOpKind,
        provider: Provider,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Execution(#[from] ExecError),

    #[error("output shape {actual} does not match declared {expected}")]
    OutputShape { expected: Shape, actual: Shape },
}
