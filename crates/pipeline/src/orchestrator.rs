// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The pipeline state machine.
//!
//! ```text
//! Loading ──► Reconciling ──► Converting ──► Validating ──► Succeeded
//!    │                            │
//!    ▼                            ▼ (direct path exhausted)
//!  Failed                Loading ──► Converting ──► Validating ──► Succeeded
//!                           │            │
//!                           ▼            ▼
//!                         Failed       Failed
//! ```
//!
//! The alternate path converts with its own configuration list
//! (`alternate_conversion`), relaxed by default so that it does not repeat
//! whatever made the direct path fail.
//!
//! Only a load failure and a conversion failure on both paths end in
//! `Failed`. Everything else (skipped weight transfers, configuration
//! fallbacks, validation errors, deployment problems) is recorded as an
//! [`Issue`] and the run still succeeds.

use crate::deploy::{AssetDirectoryDeployer, Deployer};
use crate::paths::{ConversionPath, DirectPath, IntermediatePath, PathContext};
use crate::persist::{label_map_json, write_atomic};
use crate::report::{Issue, PipelineOutcome, PipelineState, SizeReport};
use crate::validator::{NumericValidator, ValidationReport};
use crate::{PathError, PipelineConfig, PipelineError, ValidationError};
use converter::{
    Artifact, CalibrationSource, Conversion, ConversionConfig, Converter, RejectedAttempt,
    SyntheticCalibration,
};
use model_ir::{LabelSet, ModelGraph, ModelLoader, ModelWriter, Validated};
use reconciler::Reconciler;

/// Runs the conversion pipeline for one [`PipelineConfig`].
///
/// # Example
/// ```no_run
/// use pipeline::{Orchestrator, PipelineConfig};
///
/// let mut orchestrator = Orchestrator::new(PipelineConfig::default()).unwrap();
/// let outcome = orchestrator.run();
/// println!("{}", outcome.summary());
/// ```
pub struct Orchestrator {
    config: PipelineConfig,
    labels: LabelSet,
    reconciler: Reconciler,
    converter: Converter,
    calibration: Box<dyn CalibrationSource>,
    deployer: Option<Box<dyn Deployer>>,
}

fn enter(outcome: &mut PipelineOutcome, state: PipelineState) {
    tracing::info!(%state, "pipeline state");
    outcome.state = state;
    outcome.states.push(state);
}

fn fail(mut outcome: PipelineOutcome, error: PipelineError) -> PipelineOutcome {
    tracing::error!(%error, "pipeline failed");
    enter(&mut outcome, PipelineState::Failed);
    outcome.error = Some(error);
    outcome
}

impl Orchestrator {
    /// Creates an orchestrator with the default collaborators: the default
    /// operator catalog, synthetic calibration data and, when `asset_dir` is
    /// set, an [`AssetDirectoryDeployer`].
    ///
    /// # Errors
    /// [`PipelineError::Config`] if the configuration is inconsistent (for
    /// example, a label count that differs from the class count).
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let labels = config.label_set()?;
        let deployer = config
            .asset_dir
            .clone()
            .map(|dir| Box::new(AssetDirectoryDeployer::new(dir)) as Box<dyn Deployer>);

        Ok(Self {
            labels,
            reconciler: Reconciler::new(config.trial_seed),
            converter: Converter::default(),
            calibration: Box::new(SyntheticCalibration::new(config.calibration_seed)),
            deployer,
            config,
        })
    }

    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_calibration(mut self, source: Box<dyn CalibrationSource>) -> Self {
        self.calibration = source;
        self
    }

    /// Replaces the deployer; `None` disables deployment.
    pub fn with_deployer(mut self, deployer: Option<Box<dyn Deployer>>) -> Self {
        self.deployer = deployer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline to a terminal state.
    pub fn run(&mut self) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::new();

        // ── Loading ──
        enter(&mut outcome, PipelineState::Loading);
        let model_path = self.config.model_path.clone();
        let graph = match ModelLoader::load(&model_path) {
            Ok(graph) => graph,
            Err(e) => return fail(outcome, e.into()),
        };
        let source_bytes = match ModelLoader::source_size_bytes(&model_path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("cannot measure source model size: {e}");
                None
            }
        };

        // ── Reconciling ──
        enter(&mut outcome, PipelineState::Reconciling);
        let reconciled = match self.reconciler.reconcile(graph, &self.config.descriptor) {
            Ok(r) => r,
            Err(e) => return fail(outcome, e.into()),
        };
        outcome.reconciliation = Some(reconciled.mode());
        outcome
            .issues
            .extend(reconciled.report.warnings().into_iter().map(Issue::Reconciliation));
        let graph = reconciled.graph;
        let reconciled_bytes = self.save_reconciled(&graph, &mut outcome);

        // ── Converting ──
        let primary = self.config.conversion.clone();
        let (conversion, path_name) = match self.convert_with(&DirectPath, &primary, &graph, &mut outcome) {
            Ok(conversion) => (conversion, DirectPath.name()),
            Err(primary) => {
                tracing::warn!(error = %primary, "direct conversion failed; retrying through an intermediate model");
                outcome.issues.push(Issue::PrimaryPathFailed {
                    reason: primary.to_string(),
                });
                let alternate = IntermediatePath::new(self.config.scratch_dir.clone());
                let configs = self.config.alternate_conversion.clone();
                match self.convert_with(&alternate, &configs, &graph, &mut outcome) {
                    Ok(conversion) => (conversion, alternate.name()),
                    Err(e) => return fail(outcome, e.into()),
                }
            }
        };
        outcome.conversion_path = Some(path_name);
        let artifact = conversion.artifact;

        self.persist(&artifact, &mut outcome);
        if let Some(source_bytes) = source_bytes {
            let size = SizeReport {
                source_bytes,
                reconciled_bytes,
                artifact_bytes: artifact.size_bytes() as u64,
            };
            tracing::info!("{}", size.summary());
            outcome.size = Some(size);
        }

        // ── Validating ──
        enter(&mut outcome, PipelineState::Validating);
        match self.validate(&graph, &artifact) {
            Ok(report) => {
                for anomaly in &report.anomalies {
                    tracing::warn!(%anomaly, "validation anomaly");
                    outcome.issues.push(Issue::ValidationAnomaly {
                        detail: anomaly.to_string(),
                    });
                }
                tracing::info!(top = %report.top, sum = report.probability_sum, "validation finished");
                outcome.validation = Some(report);
            }
            Err(e) => {
                tracing::warn!(error = %e, "validation could not run");
                outcome.issues.push(Issue::ValidationError {
                    reason: e.to_string(),
                });
            }
        }

        self.deploy(&mut outcome);
        outcome.artifact = Some(artifact);
        enter(&mut outcome, PipelineState::Succeeded);
        outcome
    }

    /// Saves the reconciled graph when `reconciled_model_path` is set and
    /// returns its size on disk.
    fn save_reconciled(
        &self,
        graph: &ModelGraph<Validated>,
        outcome: &mut PipelineOutcome,
    ) -> Option<u64> {
        let dir = self.config.reconciled_model_path.as_ref()?;
        if let Err(e) = ModelWriter::write(graph, dir, false) {
            tracing::warn!(error = %e, "cannot save the reconciled model");
            outcome.issues.push(Issue::Persist {
                path: dir.clone(),
                reason: e.to_string(),
            });
            return None;
        }
        tracing::info!("reconciled model saved to {}", dir.display());
        outcome.reconciled_model_path = Some(dir.clone());
        ModelLoader::source_size_bytes(dir).ok()
    }

    fn convert_with(
        &mut self,
        path: &dyn ConversionPath,
        configs: &[ConversionConfig],
        graph: &ModelGraph<Validated>,
        outcome: &mut PipelineOutcome,
    ) -> Result<Conversion, PathError> {
        let mut ctx = PathContext {
            converter: &self.converter,
            configs,
            calibration: self.calibration.as_mut(),
        };
        let result = path.run(graph, &mut ctx, &mut |state| enter(outcome, state));

        let rejected: &[RejectedAttempt] = match &result {
            Ok(conversion) => conversion.rejected.as_slice(),
            Err(PathError::Conversion(e)) => e.attempts(),
            Err(_) => &[],
        };
        outcome
            .issues
            .extend(rejected.iter().map(|attempt| Issue::ConfigurationFallback {
                config: attempt.config.clone(),
                reason: attempt.error.to_string(),
            }));
        result
    }

    fn persist(&self, artifact: &Artifact, outcome: &mut PipelineOutcome) {
        let output = &self.config.output_path;
        match write_atomic(output, artifact.bytes()) {
            Ok(()) => {
                tracing::info!(bytes = artifact.size_bytes(), "artifact written to {}", output.display());
                outcome.artifact_path = Some(output.clone());
            }
            Err(e) => outcome.issues.push(Issue::Persist {
                path: output.clone(),
                reason: e.to_string(),
            }),
        }

        let label_map = &self.config.label_map_path;
        let written = label_map_json(&self.labels)
            .map_err(|e| e.to_string())
            .and_then(|json| write_atomic(label_map, &json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => outcome.label_map_path = Some(label_map.clone()),
            Err(reason) => outcome.issues.push(Issue::Persist {
                path: label_map.clone(),
                reason,
            }),
        }
    }

    fn validate(
        &self,
        graph: &ModelGraph<Validated>,
        artifact: &Artifact,
    ) -> Result<ValidationReport, ValidationError> {
        let validator = NumericValidator::new(self.labels.clone(), self.config.validation.clone());
        let reference = graph.forward(&validator.input_for(graph.input_shape()))?;
        validator.validate_artifact(artifact, Some(&reference))
    }

    fn deploy(&self, outcome: &mut PipelineOutcome) {
        let Some(deployer) = &self.deployer else {
            return;
        };
        let (artifact, labels) = match (&outcome.artifact_path, &outcome.label_map_path) {
            (Some(artifact), Some(labels)) => (artifact.clone(), labels.clone()),
            _ => {
                outcome.issues.push(Issue::DeploymentWarning {
                    reason: format!("{}: outputs were not written; nothing to deploy", deployer.name()),
                });
                return;
            }
        };
        match deployer.deploy(&artifact, &labels) {
            Ok(placed) => tracing::info!(deployer = deployer.name(), files = placed.len(), "deployed"),
            Err(e) => {
                tracing::warn!(deployer = deployer.name(), error = %e, "deployment failed");
                outcome.issues.push(Issue::DeploymentWarning {
                    reason: format!("{}: {e}", deployer.name()),
                });
            }
        }
    }
}
