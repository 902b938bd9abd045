// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # edge-convert
//!
//! Command-line interface for the edge classifier converter.
//!
//! ## Usage
//! ```bash
//! # Run the whole pipeline against the default paths
//! edge-convert
//!
//! # Same, with explicit paths or a configuration file
//! edge-convert convert --model ./models/food_classifier --output ./out/food.ecm
//! edge-convert --config pipeline.toml convert
//!
//! # Inspect a model directory or a converted artifact
//! edge-convert inspect ./models/food_classifier
//! edge-convert inspect ./output/food_classifier.ecm
//!
//! # Print the default configuration
//! edge-convert config
//! ```
//!
//! Exit status: 0 on success, 1 when the pipeline fails, 2 when the
//! configuration is unusable.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "edge-convert",
    about = "Reconcile, convert and validate image classifiers for on-device inference",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file; CLI paths override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full conversion pipeline.
    Convert(commands::convert::ConvertArgs),

    /// Describe a model directory or a converted artifact.
    Inspect {
        /// Model directory or artifact file.
        path: PathBuf,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    commands::init_tracing(cli.verbose);

    let result = match cli.command {
        None => commands::convert::execute(cli.config, commands::convert::ConvertArgs::default()),
        Some(Commands::Convert(args)) => commands::convert::execute(cli.config, args),
        Some(Commands::Inspect { path }) => {
            commands::inspect::execute(cli.config, path).map(|()| ExitCode::SUCCESS)
        }
        Some(Commands::Config) => commands::print_config(cli.config).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(commands::exit_status(&e))
        }
    }
}
