// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Post-conversion numeric validation.
//!
//! A fixed synthetic input is pushed through the artifact (or an in-memory
//! graph) and the resulting probability vector is checked. Checks that fail
//! become [`Anomaly`] entries of the [`ValidationReport`]; only a run that
//! produces no usable output at all is a [`ValidationError`].

use crate::ValidationError;
use converter::{Artifact, ArtifactInterpreter, RuntimeOps};
use model_ir::{synthetic_input, LabelSet, ModelGraph, Validated};
use std::fmt;
use tensor_core::{Shape, Tensor};

/// Validation knobs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Allowed distance of the probability sum from 1.
    pub tolerance: f32,
    /// Number of ranked predictions to report.
    pub top_k: usize,
    /// Seed of the fixed synthetic input.
    pub input_seed: u64,
    /// Operator sources of the runtime the artifact is checked on.
    pub runtime: RuntimeOps,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            top_k: 3,
            input_seed: 0,
            runtime: RuntimeOps::default(),
        }
    }
}

/// One ranked class.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub confidence: f32,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{}, {:.4})", self.label, self.index, self.confidence)
    }
}

/// How the checked output compares with the pre-conversion reference.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReferenceAgreement {
    pub reference_top: usize,
    pub top_matches: bool,
    pub max_abs_deviation: f32,
}

/// A failed check.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    ProbabilitySum { sum: f32, tolerance: f32 },
    NonFinite { count: usize },
    TopIndexDisagreement { output: usize, reference: usize },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProbabilitySum { sum, tolerance } => write!(
                f,
                "probabilities sum to {sum:.4}, outside [{:.2}, {:.2}]",
                1.0 - tolerance,
                1.0 + tolerance
            ),
            Self::NonFinite { count } => write!(f, "{count} non-finite output values"),
            Self::TopIndexDisagreement { output, reference } => write!(
                f,
                "top prediction #{output} differs from the reference's #{reference}"
            ),
        }
    }
}

/// Result of checking one output vector.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationReport {
    pub output_shape: Shape,
    pub probability_sum: f32,
    pub sum_in_range: bool,
    pub top: Prediction,
    /// Highest-confidence classes, best first.
    pub top_k: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceAgreement>,
    pub anomalies: Vec<Anomaly>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Multi-line, human-readable form.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("output shape {}", self.output_shape),
            format!(
                "probability sum {:.4} ({})",
                self.probability_sum,
                if self.sum_in_range { "ok" } else { "out of range" }
            ),
            format!("top prediction: {}", self.top),
        ];
        for (rank, p) in self.top_k.iter().enumerate() {
            lines.push(format!("  {}. {p}", rank + 1));
        }
        if let Some(r) = &self.reference {
            lines.push(format!(
                "reference top #{} ({}), max deviation {:.5}",
                r.reference_top,
                if r.top_matches { "match" } else { "MISMATCH" },
                r.max_abs_deviation
            ));
        }
        for a in &self.anomalies {
            lines.push(format!("anomaly: {a}"));
        }
        lines.join("\n")
    }
}

/// Checks classifier outputs against a label set.
#[derive(Debug, Clone)]
pub struct NumericValidator {
    labels: LabelSet,
    settings: ValidationSettings,
}

impl NumericValidator {
    pub fn new(labels: LabelSet, settings: ValidationSettings) -> Self {
        Self { labels, settings }
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// The fixed input used for every check.
    pub fn input_for(&self, shape: &Shape) -> Tensor {
        synthetic_input(shape, self.settings.input_seed)
    }

    /// Runs `artifact` on the configured runtime and checks its output,
    /// optionally against a reference output.
    pub fn validate_artifact(
        &self,
        artifact: &Artifact,
        reference: Option<&Tensor>,
    ) -> Result<ValidationReport, ValidationError> {
        let interpreter = ArtifactInterpreter::new(artifact, &self.settings.runtime)?;
        let input = self.input_for(&interpreter.input_details().shape);
        let output = interpreter.invoke(&input)?;
        self.check(&output, reference)
    }

    /// Runs `graph` and checks its output.
    pub fn validate_graph(&self, graph: &ModelGraph<Validated>) -> Result<ValidationReport, ValidationError> {
        let output = graph.forward(&self.input_for(graph.input_shape()))?;
        self.check(&output, None)
    }

    /// Checks one output vector.
    pub fn check(
        &self,
        output: &Tensor,
        reference: Option<&Tensor>,
    ) -> Result<ValidationReport, ValidationError> {
        let expected = Shape::vector(self.labels.len());
        if output.shape() != &expected {
            return Err(ValidationError::OutputShape {
                expected,
                actual: output.shape().clone(),
                labels: self.labels.len(),
            });
        }

        let mut anomalies = Vec::new();
        let values = output.as_slice();
        let non_finite = values.iter().filter(|v| !v.is_finite()).count();
        if non_finite > 0 {
            anomalies.push(Anomaly::NonFinite { count: non_finite });
        }

        let tolerance = self.settings.tolerance;
        let probability_sum = output.sum();
        // NaN sums fail this check as well.
        let sum_in_range = (probability_sum - 1.0).abs() <= tolerance;
        if !sum_in_range {
            anomalies.push(Anomaly::ProbabilitySum {
                sum: probability_sum,
                tolerance,
            });
        }

        let ranked = self.rank(values);
        let top_k: Vec<Prediction> = ranked.iter().take(self.settings.top_k).cloned().collect();
        let top = ranked.into_iter().next().ok_or_else(|| ValidationError::OutputShape {
            expected: Shape::vector(self.labels.len()),
            actual: output.shape().clone(),
            labels: self.labels.len(),
        })?;

        let reference = match reference {
            Some(r) if r.shape() == output.shape() => {
                let reference_top = r.argmax().map_or(0, |(i, _)| i);
                let max_abs_deviation = values
                    .iter()
                    .zip(r.as_slice())
                    .fold(0.0f32, |acc, (a, b)| acc.max((a - b).abs()));
                if reference_top != top.index {
                    anomalies.push(Anomaly::TopIndexDisagreement {
                        output: top.index,
                        reference: reference_top,
                    });
                }
                Some(ReferenceAgreement {
                    reference_top,
                    top_matches: reference_top == top.index,
                    max_abs_deviation,
                })
            }
            Some(r) => {
                return Err(ValidationError::OutputShape {
                    expected: output.shape().clone(),
                    actual: r.shape().clone(),
                    labels: self.labels.len(),
                })
            }
            None => None,
        };

        Ok(ValidationReport {
            output_shape: output.shape().clone(),
            probability_sum,
            sum_in_range,
            top,
            top_k,
            reference,
            anomalies,
        })
    }

    /// Orders classes by confidence, best first. NaN ranks last; ties go to
    /// the lower index.
    fn rank(&self, values: &[f32]) -> Vec<Prediction> {
        let key = |i: usize| {
            let v = values[i];
            if v.is_nan() {
                f32::NEG_INFINITY
            } else {
                v
            }
        };
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| key(b).total_cmp(&key(a)).then(a.cmp(&b)));
        order
            .into_iter()
            .map(|index| Prediction {
                index,
                label: self.labels.get(index).unwrap_or_default().to_string(),
                confidence: values[index],
            })
            .collect()
    }
}
