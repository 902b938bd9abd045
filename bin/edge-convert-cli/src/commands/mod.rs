// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

pub mod convert;
pub mod inspect;

use pipeline::{PipelineConfig, PipelineError};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig, PipelineError> {
    match path {
        Some(path) => {
            tracing::debug!("loading configuration from {}", path.display());
            PipelineConfig::from_file(&path)
        }
        None => Ok(PipelineConfig::default()),
    }
}

pub fn print_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    config.validate()?;
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Process status for a failed command: 2 for configuration errors, 1 for
/// everything else.
pub fn exit_status(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<PipelineError>() {
        Some(PipelineError::Config(_)) => 2,
        _ => 1,
    }
}

/// Formats a byte count in KB or MB.
pub fn human_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.2} MB", b / (KB * KB))
    } else {
        format!("{:.1} KB", b / KB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "0.5 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_config_errors_exit_with_two() {
        let err = anyhow::Error::new(PipelineError::Config("bad".into()));
        assert_eq!(exit_status(&err), 2);
        assert_eq!(exit_status(&anyhow::anyhow!("boom")), 1);
    }
}
