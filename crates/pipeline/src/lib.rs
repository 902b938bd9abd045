// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # pipeline
//!
//! Drives a trained classifier from its model directory to a deployed
//! artifact:
//!
//! 1. **Load** the model ([`model_ir::ModelLoader`]).
//! 2. **Reconcile** it against the configured architecture
//!    ([`reconciler::Reconciler`]).
//! 3. **Convert** it with configuration fallback ([`converter::Converter`]),
//!    retrying once through an intermediate model directory.
//! 4. **Persist** the artifact and the label map atomically.
//! 5. **Validate** the artifact's output ([`NumericValidator`]).
//! 6. **Deploy** both files ([`Deployer`]).
//!
//! The [`Orchestrator`] records every state it enters and every non-fatal
//! problem in a [`PipelineOutcome`].
//!
//! # Example
//! ```no_run
//! use pipeline::{Orchestrator, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig::from_file(Path::new("pipeline.toml")).unwrap();
//! let outcome = Orchestrator::new(config).unwrap().run();
//! assert!(outcome.succeeded(), "{}", outcome.summary());
//! ```

mod config;
mod deploy;
mod error;
mod orchestrator;
pub mod paths;
mod persist;
mod report;
mod validator;

pub use config::{PipelineConfig, DEFAULT_LABELS};
pub use deploy::{AssetDirectoryDeployer, Deployer};
pub use error::{DeploymentError, PathError, PipelineError, ValidationError};
pub use orchestrator::Orchestrator;
pub use paths::{ConversionPath, DirectPath, IntermediatePath, PathContext};
pub use persist::{label_map_json, write_atomic};
pub use report::{Issue, PipelineOutcome, PipelineState, SizeReport};
pub use validator::{
    Anomaly, NumericValidator, Prediction, ReferenceAgreement, ValidationReport,
    ValidationSettings,
};
