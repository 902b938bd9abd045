// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # converter
//!
//! Turns a validated classifier graph into a compact on-device artifact.
//!
//! The graph is first lowered to target operators ([`lower`]). Each
//! [`ConversionConfig`] is then tried in order: operators are resolved
//! against the target [`OperatorCatalog`], activation ranges are calibrated
//! from a [`CalibrationSource`] when requested, and weights are encoded in
//! the configuration's [`Representation`]. The first accepted configuration
//! wins; rejected ones are kept as [`RejectedAttempt`]s. Only when every
//! configuration is rejected does conversion fail.
//!
//! Artifacts run on the [`ArtifactInterpreter`], which reproduces the
//! target runtime's operator availability and numeric behaviour.
//!
//! # Example
//! ```no_run
//! use converter::{ConversionConfig, Converter, SyntheticCalibration};
//! use model_ir::ModelLoader;
//! use std::path::Path;
//!
//! let graph = ModelLoader::load(Path::new("./models/food_classifier")).unwrap();
//! let conversion = Converter::default()
//!     .convert(&graph, &ConversionConfig::defaults(), &mut SyntheticCalibration::new(0))
//!     .unwrap();
//! println!(
//!     "{} bytes via '{}'",
//!     conversion.artifact.size_bytes(),
//!     conversion.artifact.metadata().config_name
//! );
//! ```

mod artifact;
mod calibration;
mod catalog;
mod config;
mod converter;
mod error;
mod interpreter;
mod lowering;

pub use artifact::{Artifact, ArtifactMetadata, TensorDetails, ARTIFACT_MAGIC, ARTIFACT_VERSION};
pub use calibration::{ActivationRanges, CalibrationSource, SyntheticCalibration};
pub use catalog::{OpSupport, OperatorCatalog, Provider};
pub use config::{
    CalibrationSettings, ConversionConfig, OpSet, Optimization, Representation,
    DEFAULT_CALIBRATION_SAMPLES,
};
pub use converter::{Conversion, Converter};
pub use error::{
    ArtifactError, AttemptError, CalibrationError, ConversionError, ExecError, InterpreterError,
    RejectedAttempt,
};
pub use interpreter::{ArtifactInterpreter, RuntimeOps};
pub use lowering::{lower, LoweredOp, OpInput, Program, TargetOpKind};
