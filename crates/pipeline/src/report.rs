// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pipeline states, issues and the run outcome.

use crate::validator::ValidationReport;
use crate::PipelineError;
use converter::Artifact;
use reconciler::{ReconciliationMode, ReconciliationWarning};
use std::fmt;
use std::path::PathBuf;

/// States of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Loading,
    Reconciling,
    Converting,
    Validating,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::Reconciling => "reconciling",
            Self::Converting => "converting",
            Self::Validating => "validating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// A non-fatal event worth reporting.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// A rebuilt layer kept fresh weights.
    Reconciliation(ReconciliationWarning),
    /// A conversion configuration was rejected and the next one tried.
    ConfigurationFallback { config: String, reason: String },
    /// The direct path exhausted its configurations.
    PrimaryPathFailed { reason: String },
    /// An output file could not be written.
    Persist { path: PathBuf, reason: String },
    /// Numeric validation could not run.
    ValidationError { reason: String },
    /// Validation ran and flagged something.
    ValidationAnomaly { detail: String },
    DeploymentWarning { reason: String },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconciliation(w) => write!(f, "reconciliation: {w}"),
            Self::ConfigurationFallback { config, reason } => {
                write!(f, "configuration '{config}' rejected: {reason}")
            }
            Self::PrimaryPathFailed { reason } => write!(f, "primary conversion path failed: {reason}"),
            Self::Persist { path, reason } => write!(f, "cannot write {}: {reason}", path.display()),
            Self::ValidationError { reason } => write!(f, "validation error: {reason}"),
            Self::ValidationAnomaly { detail } => write!(f, "validation anomaly: {detail}"),
            Self::DeploymentWarning { reason } => write!(f, "deployment warning: {reason}"),
        }
    }
}

/// Source model size vs artifact size.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SizeReport {
    pub source_bytes: u64,
    /// Size of the saved reconciled model, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciled_bytes: Option<u64>,
    pub artifact_bytes: u64,
}

impl SizeReport {
    /// Size reduction in percent; negative when the artifact is larger.
    pub fn compression_percent(&self) -> f64 {
        if self.source_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.artifact_bytes as f64 / self.source_bytes as f64) * 100.0
    }

    pub fn summary(&self) -> String {
        const MB: f64 = 1024.0 * 1024.0;
        let reconciled = self
            .reconciled_bytes
            .map(|b| format!("reconciled {:.2} MB, ", b as f64 / MB))
            .unwrap_or_default();
        format!(
            "source {:.2} MB, {reconciled}artifact {:.2} MB, {:.1}% smaller",
            self.source_bytes as f64 / MB,
            self.artifact_bytes as f64 / MB,
            self.compression_percent()
        )
    }
}

/// Everything a pipeline run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Terminal state.
    pub state: PipelineState,
    /// Every state entered, in order, ending with the terminal one.
    pub states: Vec<PipelineState>,
    pub artifact: Option<Artifact>,
    /// Where the artifact was written, if it was.
    pub artifact_path: Option<PathBuf>,
    pub label_map_path: Option<PathBuf>,
    /// Where the reconciled model was saved, if it was.
    pub reconciled_model_path: Option<PathBuf>,
    pub reconciliation: Option<ReconciliationMode>,
    /// Name of the conversion path that produced the artifact.
    pub conversion_path: Option<&'static str>,
    pub validation: Option<ValidationReport>,
    pub issues: Vec<Issue>,
    pub size: Option<SizeReport>,
    /// Why the run failed, for [`PipelineState::Failed`].
    pub error: Option<PipelineError>,
}

impl PipelineOutcome {
    pub(crate) fn new() -> Self {
        Self {
            state: PipelineState::Loading,
            states: Vec::new(),
            artifact: None,
            artifact_path: None,
            label_map_path: None,
            reconciled_model_path: None,
            reconciliation: None,
            conversion_path: None,
            validation: None,
            issues: Vec::new(),
            size: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Succeeded
    }

    /// Validation errors recorded in the issue log.
    pub fn validation_errors(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|i| match i {
            Issue::ValidationError { reason } => Some(reason.as_str()),
            _ => None,
        })
    }

    /// Multi-line summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let path: Vec<String> = self.states.iter().map(ToString::to_string).collect();
        let mut lines = vec![format!("Pipeline {}: {}", self.state, path.join(" -> "))];
        if let Some(mode) = self.reconciliation {
            lines.push(format!("Reconciliation: {mode}"));
        }
        if let Some(artifact) = &self.artifact {
            let meta = artifact.metadata();
            lines.push(format!(
                "Artifact: {} bytes, {} via '{}' ({} path)",
                artifact.size_bytes(),
                meta.representation,
                meta.config_name,
                self.conversion_path.unwrap_or("unknown")
            ));
        }
        if let Some(size) = &self.size {
            lines.push(format!("Size: {}", size.summary()));
        }
        if let Some(report) = &self.validation {
            lines.push(format!("Top prediction: {}", report.top));
        }
        for issue in &self.issues {
            lines.push(format!("  ! {issue}"));
        }
        if let Some(error) = &self.error {
            lines.push(format!("Error: {error}"));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression() {
        let s = SizeReport {
            source_bytes: 1000,
            reconciled_bytes: None,
            artifact_bytes: 250,
        };
        assert!((s.compression_percent() - 75.0).abs() < 1e-9);
        assert!(s.summary().contains("75.0% smaller"));
        assert!(!s.summary().contains("reconciled"));
        let with_reconciled = SizeReport {
            reconciled_bytes: Some(2 * 1024 * 1024),
            ..s
        };
        assert!(with_reconciled.summary().contains("reconciled 2.00 MB"));
        let empty = SizeReport {
            source_bytes: 0,
            reconciled_bytes: None,
            artifact_bytes: 10,
        };
        assert_eq!(empty.compression_percent(), 0.0);
    }

    #[test]
    fn test_validation_errors_filter() {
        let mut outcome = PipelineOutcome::new();
        outcome.issues.push(Issue::DeploymentWarning { reason: "x".into() });
        outcome.issues.push(Issue::ValidationError { reason: "bad shape".into() });
        assert_eq!(outcome.validation_errors().collect::<Vec<_>>(), ["bad shape"]);
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Validating.is_terminal());
        assert_eq!(PipelineState::Reconciling.to_string(), "reconciling");
    }
}
