// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # reconciler
//!
//! Detects architecture drift between a loaded classifier and its
//! [`ArchitectureDescriptor`](model_ir::ArchitectureDescriptor), and repairs
//! it.
//!
//! A graph that already matches is passed through unchanged
//! ([`ReconciliationMode::ReconciledExact`]). Otherwise a fresh graph is
//! synthesized from the descriptor and every weighted layer whose shapes
//! still match is copied over by structural position
//! ([`ReconciliationMode::ReconciledRebuilt`]). Skipped layers are reported
//! as [`ReconciliationWarning`]s, never raised.
//!
//! # Example
//! ```no_run
//! use model_ir::{ArchitectureDescriptor, ModelLoader};
//! use reconciler::Reconciler;
//! use std::path::Path;
//!
//! let graph = ModelLoader::load(Path::new("./models/food_classifier")).unwrap();
//! let descriptor = ArchitectureDescriptor::canonical();
//! let result = Reconciler::default().reconcile(graph, &descriptor).unwrap();
//! println!("{}", result.report.summary());
//! for warning in result.report.warnings() {
//!     println!("  {warning}");
//! }
//! ```

mod error;
mod reconcile;
mod report;
mod transfer;

pub use error::ReconcileError;
pub use reconcile::{Reconciliation, Reconciler, DEFAULT_TRIAL_SEED};
pub use report::{
    NodeTransfer, ReconciliationMode, ReconciliationReport, ReconciliationWarning, Section,
    TransferOutcome,
};
