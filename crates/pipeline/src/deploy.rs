// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Deployment of converted assets.

use crate::persist::write_atomic;
use crate::DeploymentError;
use std::path::{Path, PathBuf};

/// Places the artifact and its label map where an application picks them up.
pub trait Deployer {
    /// Returns the name of this deployer (for logging).
    fn name(&self) -> &str;

    /// Deploys both files, returning the paths written.
    fn deploy(&self, artifact: &Path, label_map: &Path) -> Result<Vec<PathBuf>, DeploymentError>;
}

/// Copies assets into a directory, keeping their file names.
#[derive(Debug, Clone)]
pub struct AssetDirectoryDeployer {
    dir: PathBuf,
}

impl AssetDirectoryDeployer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn copy(&self, source: &Path) -> Result<PathBuf, DeploymentError> {
        let name = source
            .file_name()
            .ok_or_else(|| DeploymentError::MissingSource(source.to_path_buf()))?;
        let bytes = std::fs::read(source).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeploymentError::MissingSource(source.to_path_buf())
            } else {
                DeploymentError::Io {
                    path: source.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let target = self.dir.join(name);
        write_atomic(&target, &bytes).map_err(|source| DeploymentError::Io {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

impl Deployer for AssetDirectoryDeployer {
    fn name(&self) -> &str {
        "asset-directory"
    }

    fn deploy(&self, artifact: &Path, label_map: &Path) -> Result<Vec<PathBuf>, DeploymentError> {
        let written = vec![self.copy(artifact)?, self.copy(label_map)?];
        tracing::info!(dir = %self.dir.display(), files = written.len(), "assets deployed");
        Ok(written)
    }
}
