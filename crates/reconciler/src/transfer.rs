// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Positional weight transfer from a source graph into a rebuilt one.
//!
//! Weighted layers are paired by `(section, ordinal)`: the n-th weighted
//! backbone layer of the target receives the n-th weighted backbone layer
//! of the source, and likewise for the head. Values are copied only when
//! every weight shape matches; the target keeps its fresh weights otherwise.

use crate::report::{NodeTransfer, Section, TransferOutcome};
use model_ir::{LayerNode, Loaded, ModelGraph};

pub(crate) fn section_of(node: &LayerNode) -> Section {
    if node.role.is_head() {
        Section::Head
    } else {
        Section::Backbone
    }
}

fn weighted(nodes: &[LayerNode], section: Section) -> Vec<&LayerNode> {
    nodes
        .iter()
        .filter(|n| n.op.weight_count() > 0 && section_of(n) == section)
        .collect()
}

/// Copies matching weights from `source` into `target`, returning one log
/// entry per weighted target layer in graph order.
pub(crate) fn transfer_weights(source: &[LayerNode], target: &mut ModelGraph<Loaded>) -> Vec<NodeTransfer> {
    let backbone = weighted(source, Section::Backbone);
    let head = weighted(source, Section::Head);
    let mut ordinals = [0usize; 2];
    let mut log = Vec::new();

    for node in target.nodes_mut() {
        if node.op.weight_count() == 0 {
            continue;
        }
        let section = section_of(node);
        let (pool, slot) = match section {
            Section::Backbone => (&backbone, &mut ordinals[0]),
            Section::Head => (&head, &mut ordinals[1]),
        };
        let ordinal = *slot;
        *slot += 1;

        let entry = match pool.get(ordinal) {
            None => NodeTransfer {
                target: node.name.clone(),
                source: None,
                section,
                ordinal,
                outcome: TransferOutcome::SkippedMissing,
            },
            Some(src) => {
                let outcome = match node.replace_weight_values(src.weights()) {
                    Ok(()) => TransferOutcome::Transferred,
                    Err(_) => TransferOutcome::SkippedShapeMismatch {
                        expected: node.weights().iter().map(|w| w.shape().clone()).collect(),
                        found: src.weights().iter().map(|w| w.shape().clone()).collect(),
                    },
                };
                NodeTransfer {
                    target: node.name.clone(),
                    source: Some(src.name.clone()),
                    section,
                    ordinal,
                    outcome,
                }
            }
        };

        match &entry.outcome {
            TransferOutcome::Transferred => {
                tracing::debug!(target_layer = %entry.target, section = section.as_str(), ordinal, "weights transferred")
            }
            TransferOutcome::SkippedShapeMismatch { .. } => tracing::warn!(
                target_layer = %entry.target,
                source_layer = entry.source.as_deref().unwrap_or_default(),
                "weight shapes differ; keeping fresh weights"
            ),
            TransferOutcome::SkippedMissing => tracing::warn!(
                target_layer = %entry.target,
                section = section.as_str(),
                ordinal,
                "no source layer at this position; keeping fresh weights"
            ),
        }
        log.push(entry);
    }

    log
}
