// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edge-convert inspect`: describe a model directory or an artifact.
//!
//! For a model, prints the layer table and whether it already matches the
//! configured architecture. For an artifact, prints its metadata, operator
//! list and a validation run.

use super::{human_bytes, load_config};
use converter::Artifact;
use pipeline::{NumericValidator, PipelineConfig};
use reconciler::Reconciler;
use std::path::{Path, PathBuf};

pub fn execute(config_path: Option<PathBuf>, path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    if path.is_file() {
        inspect_artifact(&config, &path)
    } else {
        inspect_model(&config, &path)
    }
}

fn inspect_model(config: &PipelineConfig, dir: &Path) -> anyhow::Result<()> {
    let graph = model_ir::ModelLoader::load(dir)
        .map_err(|e| anyhow::anyhow!("failed to load model from '{}': {e}", dir.display()))?;

    // ── Summary ────────────────────────────────────────────────
    println!("  {}", graph.summary());
    println!("  Weights: {}", human_bytes(graph.total_weight_bytes() as u64));
    println!();

    // ── Per-Layer Detail ───────────────────────────────────────
    println!(
        "  {:<4} {:<24} {:<10} {:<18} {:>10} {:>8}",
        "Idx", "Name", "Role", "Op", "Output", "Params",
    );
    println!("  {}", "-".repeat(80));
    for (i, node) in graph.iter_nodes().enumerate() {
        let output = graph
            .output_shape_of(i)
            .map(ToString::to_string)
            .unwrap_or_default();
        println!(
            "  {:<4} {:<24} {:<10} {:<18} {:>10} {:>8}",
            i,
            truncate(&node.name, 24),
            node.role.as_str(),
            node.op.kind(),
            output,
            node.param_count(),
        );
    }
    println!();

    // ── Architecture Check ─────────────────────────────────────
    match Reconciler::new(config.trial_seed).check(&graph, &config.descriptor) {
        Ok(()) => println!("  Matches the configured architecture: weights transfer as-is."),
        Err(reason) => println!("  Needs rebuilding: {reason}"),
    }
    println!();
    Ok(())
}

fn inspect_artifact(config: &PipelineConfig, path: &Path) -> anyhow::Result<()> {
    let artifact = Artifact::read(path)?;
    let meta = artifact.metadata();

    println!("  Artifact:       {} ({})", path.display(), human_bytes(artifact.size_bytes() as u64));
    println!("  Configuration:  {}", meta.config_name);
    println!("  Representation: {}", meta.representation);
    println!("  Calibrated:     {}", if meta.calibrated { "yes" } else { "no" });
    println!("  Input:          {} {} {}", meta.input.name, meta.input.shape, meta.input.dtype);
    println!("  Output:         {} {} {}", meta.output.name, meta.output.shape, meta.output.dtype);
    let ops: Vec<String> = meta.operators.iter().map(ToString::to_string).collect();
    println!("  Operators:      {} ({} ops)", ops.join(", "), artifact.num_ops());
    println!();

    let labels = config.label_set()?;
    let validator = NumericValidator::new(labels, config.validation.clone());
    match validator.validate_artifact(&artifact, None) {
        Ok(report) => {
            for line in report.summary().lines() {
                println!("  {line}");
            }
        }
        Err(e) => println!("  Validation failed: {e}"),
    }
    println!();
    Ok(())
}

/// Truncates a string to `max_len` with ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("head.pool", 24), "head.pool");
        assert_eq!(truncate("blocks.0.expand.conv", 10), "blocks....");
    }
}
