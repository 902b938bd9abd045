// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use crate::error::ReconcileError;
use crate::report::{ReconciliationMode, ReconciliationReport};
use crate::transfer::transfer_weights;
use model_ir::{backbone, synthetic_input, ArchitectureDescriptor, ModelGraph, Validated};

/// Seed of the synthetic input used for the trial forward pass.
pub const DEFAULT_TRIAL_SEED: u64 = 0x7e57;

/// A graph guaranteed to match its descriptor, plus how it got there.
#[derive(Debug)]
pub struct Reconciliation {
    pub graph: ModelGraph<Validated>,
    pub report: ReconciliationReport,
}

impl Reconciliation {
    pub fn mode(&self) -> ReconciliationMode {
        self.report.mode
    }
}

/// Brings a loaded graph in line with an [`ArchitectureDescriptor`].
#[derive(Debug, Clone)]
pub struct Reconciler {
    trial_seed: u64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            trial_seed: DEFAULT_TRIAL_SEED,
        }
    }
}

impl Reconciler {
    pub fn new(trial_seed: u64) -> Self {
        Self { trial_seed }
    }

    /// Checks whether `graph` already matches `descriptor`.
    ///
    /// Runs, in order: the input shape check, a trial forward pass on a
    /// deterministic synthetic input, the output length check and the head
    /// signature comparison. The first failing check is returned.
    pub fn check(
        &self,
        graph: &ModelGraph<Validated>,
        descriptor: &ArchitectureDescriptor,
    ) -> Result<(), ReconcileError> {
        if graph.input_shape() != descriptor.input_shape() {
            return Err(ReconcileError::InputShape {
                expected: descriptor.input_shape().clone(),
                actual: graph.input_shape().clone(),
            });
        }

        let input = synthetic_input(descriptor.input_shape(), self.trial_seed);
        let output = graph.forward(&input).map_err(ReconcileError::TrialPass)?;
        if output.num_elements() != descriptor.num_classes() {
            return Err(ReconcileError::ClassCount {
                expected: descriptor.num_classes(),
                actual: output.num_elements(),
            });
        }

        let actual = graph.head_signature();
        if actual != descriptor.head() {
            return Err(ReconcileError::HeadSignature {
                expected: descriptor.head().to_vec(),
                actual,
            });
        }
        Ok(())
    }

    /// Returns a graph matching `descriptor`.
    ///
    /// A graph that passes [`check`](Self::check) is returned untouched.
    /// Anything else is replaced by a fresh graph built from the descriptor,
    /// keeping the source graph's name, into which every weighted layer
    /// whose shapes still match is copied by position.
    ///
    /// # Errors
    /// Only [`ReconcileError::Rebuild`], when the descriptor itself cannot
    /// produce a valid graph.
    pub fn reconcile(
        &self,
        graph: ModelGraph<Validated>,
        descriptor: &ArchitectureDescriptor,
    ) -> Result<Reconciliation, ReconcileError> {
        let rejection = match self.check(&graph, descriptor) {
            Ok(()) => {
                tracing::info!(model = %graph.name, "architecture matches descriptor");
                return Ok(Reconciliation {
                    graph,
                    report: ReconciliationReport::exact(),
                });
            }
            Err(reason) => reason,
        };
        tracing::warn!(model = %graph.name, reason = %rejection, "architecture drift; rebuilding");

        let mut rebuilt = backbone::instantiate(descriptor, &graph.name);
        let source = graph.into_nodes();
        let transfers = transfer_weights(&source, &mut rebuilt);
        let graph = rebuilt.validate().map_err(ReconcileError::Rebuild)?;

        let report = ReconciliationReport {
            mode: ReconciliationMode::ReconciledRebuilt,
            rejection: Some(rejection.to_string()),
            transfers,
        };
        tracing::info!(model = %graph.name, "{}", report.summary());
        Ok(Reconciliation { graph, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::BackboneSpec;
    use tensor_core::Shape;

    fn descriptor(hidden: usize, classes: usize) -> ArchitectureDescriptor {
        ArchitectureDescriptor::new(
            Shape::image(16, 16, 3),
            BackboneSpec {
                width: 4,
                ..BackboneSpec::default()
            },
            ArchitectureDescriptor::standard_head(hidden),
            classes,
        )
        .unwrap()
    }

    #[test]
    fn test_check_accepts_matching_graph() {
        let d = descriptor(8, 5);
        let g = backbone::build(&d, "m").unwrap();
        Reconciler::default().check(&g, &d).unwrap();
    }

    #[test]
    fn test_check_order_input_shape_first() {
        let d = descriptor(8, 5);
        let other = ArchitectureDescriptor::new(
            Shape::image(32, 32, 3),
            d.backbone().clone(),
            d.head().to_vec(),
            3,
        )
        .unwrap();
        let g = backbone::build(&other, "m").unwrap();
        assert!(matches!(
            Reconciler::default().check(&g, &d),
            Err(ReconcileError::InputShape { .. })
        ));
    }

    #[test]
    fn test_check_reports_class_count() {
        let g = backbone::build(&descriptor(8, 3), "m").unwrap();
        assert!(matches!(
            Reconciler::default().check(&g, &descriptor(8, 5)),
            Err(ReconcileError::ClassCount { expected: 5, actual: 3 })
        ));
    }

    #[test]
    fn test_check_reports_head_signature() {
        let g = backbone::build(&descriptor(16, 5), "m").unwrap();
        let err = Reconciler::default()
            .check(&g, &descriptor(8, 5))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::HeadSignature { .. }));
        assert!(err.to_string().contains("dense(16, relu)"));
    }

    #[test]
    fn test_rebuild_keeps_name() {
        let g = backbone::build(&descriptor(16, 5), "food").unwrap();
        let r = Reconciler::default().reconcile(g, &descriptor(8, 5)).unwrap();
        assert_eq!(r.mode(), ReconciliationMode::ReconciledRebuilt);
        assert_eq!(r.graph.name, "food");
        assert!(r.report.rejection.as_deref().unwrap().contains("head signature"));
    }
}
