// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reasons a graph does not match its descriptor.

use model_ir::{HeadLayer, ModelError};
use tensor_core::Shape;

/// Why the fast path rejected a graph, or why a rebuild could not be
/// assembled.
///
/// Rejections are recorded in the [`ReconciliationReport`](crate::ReconciliationReport);
/// only [`ReconcileError::Rebuild`] is ever returned to a caller.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The graph's input shape differs from the descriptor's.
    #[error("input shape {actual} does not match expected {expected}")]
    InputShape { expected: Shape, actual: Shape },

    /// The trial forward pass failed.
    #[error("trial forward pass failed: {0}")]
    TrialPass(#[source] ModelError),

    /// The trial output has the wrong length.
    #[error("trial output has {actual} classes, expected {expected}")]
    ClassCount { expected: usize, actual: usize },

    /// The head's layers or hyper-parameters differ from the descriptor's.
    #[error("head signature {} does not match expected {}", describe(.actual), describe(.expected))]
    HeadSignature {
        expected: Vec<HeadLayer>,
        actual: Vec<HeadLayer>,
    },

    /// The fresh graph built from the descriptor failed validation.
    #[error("cannot build graph from descriptor: {0}")]
    Rebuild(#[source] ModelError),
}

fn describe(head: &[HeadLayer]) -> String {
    let parts: Vec<String> = head
        .iter()
        .map(|h| match h {
            HeadLayer::GlobalAveragePool => "pool".to_string(),
            HeadLayer::Dropout { rate } => format!("dropout({rate})"),
            HeadLayer::Dense { units, activation } => format!("dense({units}, {activation})"),
            HeadLayer::Output { activation } => format!("output({activation})"),
        })
        .collect();
    format!("[{}]", parts.join(" -> "))
}
