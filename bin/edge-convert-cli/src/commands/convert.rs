// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edge-convert convert`: run the pipeline end to end.
//!
//! ```text
//! Loading → Reconciling → Converting → Validating → Succeeded | Failed
//! ```

use super::{human_bytes, load_config};
use pipeline::{Orchestrator, PipelineConfig, PipelineState};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Default, clap::Args)]
pub struct ConvertArgs {
    /// Source model directory.
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Output artifact path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output label map path.
    #[arg(short, long)]
    pub labels: Option<PathBuf>,

    /// Asset directory to deploy into.
    #[arg(short, long, conflicts_with = "no_deploy")]
    pub assets: Option<PathBuf>,

    /// Skip deployment.
    #[arg(long)]
    pub no_deploy: bool,
}

impl ConvertArgs {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(labels) = self.labels {
            config.label_map_path = labels;
        }
        if self.no_deploy {
            config.asset_dir = None;
        } else if let Some(assets) = self.assets {
            config.asset_dir = Some(assets);
        }
    }
}

pub fn execute(config_path: Option<PathBuf>, args: ConvertArgs) -> anyhow::Result<ExitCode> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║           edge-convert · Classifier Converter        ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let mut config = load_config(config_path)?;
    args.apply(&mut config);

    // ── Configuration ──────────────────────────────────────────
    println!("  Config:");
    println!("   Model:    {}", config.model_path.display());
    println!("   Output:   {}", config.output_path.display());
    println!("   Labels:   {} ({} classes)", config.label_map_path.display(), config.labels.len());
    match &config.asset_dir {
        Some(dir) => println!("   Assets:   {}", dir.display()),
        None => println!("   Assets:   (not deployed)"),
    }
    let names: Vec<&str> = config.conversion.iter().map(|c| c.name.as_str()).collect();
    println!("   Configs:  {}", names.join(" → "));
    let names: Vec<&str> = config.alternate_conversion.iter().map(|c| c.name.as_str()).collect();
    println!("   Fallback: {} (intermediate model)", names.join(" → "));
    if let Some(dir) = &config.reconciled_model_path {
        println!("   Rebuilt:  {}", dir.display());
    }
    println!();

    let mut orchestrator = Orchestrator::new(config)?;
    let outcome = orchestrator.run();

    // ── Outcome ────────────────────────────────────────────────
    println!("{}", outcome.summary());
    if let Some(size) = &outcome.size {
        println!();
        println!(
            "  Size: {} → {} ({:.1}% smaller)",
            human_bytes(size.source_bytes),
            human_bytes(size.artifact_bytes),
            size.compression_percent()
        );
        if let Some(bytes) = size.reconciled_bytes {
            println!("  Reconciled model: {}", human_bytes(bytes));
        }
    }
    if let Some(report) = &outcome.validation {
        println!();
        for line in report.summary().lines() {
            println!("  {line}");
        }
    }
    println!();

    Ok(match outcome.state {
        PipelineState::Succeeded => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let mut config = PipelineConfig::default();
        ConvertArgs {
            model: Some("/m".into()),
            assets: Some("/a".into()),
            ..ConvertArgs::default()
        }
        .apply(&mut config);
        assert_eq!(config.model_path, PathBuf::from("/m"));
        assert_eq!(config.asset_dir, Some(PathBuf::from("/a")));
        assert_eq!(config.output_path, PipelineConfig::default().output_path);
    }

    #[test]
    fn test_no_deploy_clears_assets() {
        let mut config = PipelineConfig::default();
        ConvertArgs {
            no_deploy: true,
            ..ConvertArgs::default()
        }
        .apply(&mut config);
        assert!(config.asset_dir.is_none());
    }
}
