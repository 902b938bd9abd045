// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reconciliation report: the verdict plus a per-node weight transfer log.

use std::fmt;
use tensor_core::Shape;

/// How the reconciled graph was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationMode {
    /// The loaded graph already matched and was returned unmodified.
    ReconciledExact,
    /// A fresh graph was synthesized and weights were transferred into it.
    ReconciledRebuilt,
}

impl fmt::Display for ReconciliationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReconciledExact => "reconciled-exact",
            Self::ReconciledRebuilt => "reconciled-rebuilt",
        })
    }
}

/// Structural section a weighted layer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Backbone,
    Head,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backbone => "backbone",
            Self::Head => "head",
        }
    }
}

/// Result of transferring weights into one rebuilt layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    Transferred,
    /// The source layer at the same position has differently shaped weights.
    SkippedShapeMismatch {
        expected: Vec<Shape>,
        found: Vec<Shape>,
    },
    /// The source has no weighted layer at this position.
    SkippedMissing,
}

impl TransferOutcome {
    pub fn is_transferred(&self) -> bool {
        matches!(self, Self::Transferred)
    }
}

/// One entry of the transfer log.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeTransfer {
    /// Layer in the rebuilt graph.
    pub target: String,
    /// Layer in the source graph it was paired with, if any.
    pub source: Option<String>,
    pub section: Section,
    /// Position among weighted layers of the section.
    pub ordinal: usize,
    #[serde(flatten)]
    pub outcome: TransferOutcome,
}

/// A non-fatal reconciliation issue: a layer that kept fresh weights.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReconciliationWarning {
    pub layer: String,
    pub detail: String,
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weights not transferred to '{}': {}", self.layer, self.detail)
    }
}

/// Everything the reconciler decided.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReconciliationReport {
    pub mode: ReconciliationMode,
    /// Why the fast path rejected the loaded graph (rebuilt mode only).
    pub rejection: Option<String>,
    /// Per-layer transfer log (rebuilt mode only), backbone first.
    pub transfers: Vec<NodeTransfer>,
}

impl ReconciliationReport {
    pub(crate) fn exact() -> Self {
        Self {
            mode: ReconciliationMode::ReconciledExact,
            rejection: None,
            transfers: Vec::new(),
        }
    }

    /// Number of layers whose weights were copied.
    pub fn transferred_count(&self) -> usize {
        self.transfers
            .iter()
            .filter(|t| t.outcome.is_transferred())
            .count()
    }

    /// Transfer log entries for one section.
    pub fn section(&self, section: Section) -> impl Iterator<Item = &NodeTransfer> {
        self.transfers.iter().filter(move |t| t.section == section)
    }

    /// One warning per layer that kept its fresh weights, in graph order.
    pub fn warnings(&self) -> Vec<ReconciliationWarning> {
        self.transfers
            .iter()
            .filter_map(|t| {
                let detail = match &t.outcome {
                    TransferOutcome::Transferred => return None,
                    TransferOutcome::SkippedShapeMismatch { expected, found } => format!(
                        "shape mismatch with source '{}' (expected {}, found {})",
                        t.source.as_deref().unwrap_or("?"),
                        join(expected),
                        join(found)
                    ),
                    TransferOutcome::SkippedMissing => format!(
                        "source has no {} layer at position {}",
                        t.section.as_str(),
                        t.ordinal
                    ),
                };
                Some(ReconciliationWarning {
                    layer: t.target.clone(),
                    detail,
                })
            })
            .collect()
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        match self.mode {
            ReconciliationMode::ReconciledExact => "architecture matches; graph kept as loaded".into(),
            ReconciliationMode::ReconciledRebuilt => format!(
                "rebuilt ({}); transferred {}/{} weighted layers",
                self.rejection.as_deref().unwrap_or("no reason recorded"),
                self.transferred_count(),
                self.transfers.len()
            ),
        }
    }
}

fn join(shapes: &[Shape]) -> String {
    shapes.iter().map(Shape::to_string).collect::<Vec<_>>().join(" ")
}
