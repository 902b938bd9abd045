// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pipeline configuration loaded from TOML files or constructed programmatically.
//!
//! Every field has a default, so an empty file is a valid configuration.
//!
//! # TOML Format
//! ```toml
//! model_path = "./models/food_classifier"
//! output_path = "./output/food_classifier.ecm"
//! label_map_path = "./output/labels.json"
//! asset_dir = "./app/src/main/assets"
//! labels = ["biriyani", "bisibelebath", "..."]
//!
//! [descriptor]
//! input_shape = [224, 224, 3]
//! num_classes = 20
//! backbone = { kind = "mobilenet_v2_lite", width = 16, seed = 42 }
//! head = [
//!     { type = "global_average_pool" },
//!     { type = "dropout", rate = 0.2 },
//!     { type = "dense", units = 128, activation = "relu" },
//!     { type = "dropout", rate = 0.2 },
//!     { type = "output", activation = "softmax" },
//! ]
//!
//! [validation]
//! tolerance = 0.01
//!
//! [[conversion]]
//! name = "float32-builtins"
//! optimization = "none"
//! op_sets = ["builtins"]
//! representation = "float32"
//! ```

use crate::validator::ValidationSettings;
use crate::PipelineError;
use converter::ConversionConfig;
use model_ir::{ArchitectureDescriptor, LabelSet};
use std::path::{Path, PathBuf};

/// The 20 food categories of the reference classifier, in output order.
pub const DEFAULT_LABELS: [&str; 20] = [
    "biriyani",
    "bisibelebath",
    "butternaan",
    "chaat",
    "chappati",
    "dhokla",
    "dosa",
    "gulab jamun",
    "halwa",
    "idly",
    "kathi roll",
    "meduvadai",
    "noodles",
    "paniyaram",
    "poori",
    "samosa",
    "tandoori chicken",
    "upma",
    "vada pav",
    "ven pongal",
];

/// Configuration for one pipeline run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source model directory (`model.json` + `model.safetensors`).
    pub model_path: PathBuf,
    /// Where the artifact is written.
    pub output_path: PathBuf,
    /// Where the `{"label": index}` map is written.
    pub label_map_path: PathBuf,
    /// Where the reconciled model directory is saved, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciled_model_path: Option<PathBuf>,
    /// Directory the artifact and label map are deployed to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_dir: Option<PathBuf>,
    /// Parent of the alternate path's intermediate model directory.
    pub scratch_dir: PathBuf,
    /// Seed of the synthetic calibration source.
    pub calibration_seed: u64,
    /// Seed of the reconciler's trial input.
    pub trial_seed: u64,
    /// Class names in output order.
    pub labels: Vec<String>,
    pub descriptor: ArchitectureDescriptor,
    pub validation: ValidationSettings,
    /// Conversion configurations, in fallback order.
    pub conversion: Vec<ConversionConfig>,
    /// Configurations of the alternate (intermediate model) path.
    pub alternate_conversion: Vec<ConversionConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/food_classifier"),
            output_path: PathBuf::from("./output/food_classifier.ecm"),
            label_map_path: PathBuf::from("./output/labels.json"),
            reconciled_model_path: Some(PathBuf::from("./output/food_classifier_reconciled")),
            asset_dir: Some(PathBuf::from("./app/src/main/assets")),
            scratch_dir: PathBuf::from("./output/scratch"),
            calibration_seed: 0,
            trial_seed: reconciler::DEFAULT_TRIAL_SEED,
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            descriptor: ArchitectureDescriptor::canonical(),
            validation: ValidationSettings::default(),
            conversion: ConversionConfig::defaults(),
            alternate_conversion: vec![ConversionConfig::dynamic_range()],
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        toml::from_str(toml_str)
            .map_err(|e| PipelineError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("TOML serialise error: {e}")))
    }

    /// The configured labels as a checked [`LabelSet`].
    pub fn label_set(&self) -> Result<LabelSet, PipelineError> {
        LabelSet::new(self.labels.clone()).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Checks cross-field consistency.
    ///
    /// Labels must be unique and as many as the descriptor's classes, the
    /// tolerance must be a non-negative number and every conversion
    /// configuration must be usable.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.label_set()?;
        if self.labels.len() != self.descriptor.num_classes() {
            return Err(PipelineError::Config(format!(
                "{} labels configured for a {}-class descriptor",
                self.labels.len(),
                self.descriptor.num_classes()
            )));
        }
        let tolerance = self.validation.tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(PipelineError::Config(format!(
                "validation tolerance must be non-negative, got {tolerance}"
            )));
        }
        if self.validation.top_k == 0 {
            return Err(PipelineError::Config("validation top_k must be positive".into()));
        }
        if self.conversion.is_empty() || self.alternate_conversion.is_empty() {
            return Err(PipelineError::Config(
                "both conversion paths need at least one configuration".into(),
            ));
        }
        for config in self.conversion.iter().chain(&self.alternate_conversion) {
            config.validate().map_err(PipelineError::Config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converter::Representation;

    #[test]
    fn test_default() {
        let c = PipelineConfig::default();
        assert_eq!(c.labels.len(), 20);
        assert_eq!(c.label_set().unwrap().get(7), Some("gulab jamun"));
        assert_eq!(c.descriptor, ArchitectureDescriptor::canonical());
        assert_eq!(c.conversion.len(), 3);
        assert_eq!(c.alternate_conversion.len(), 1);
        assert!(c.alternate_conversion[0].calibration.is_none());
        c.validate().unwrap();
    }

    #[test]
    fn test_empty_toml_is_default() {
        let c = PipelineConfig::from_toml("").unwrap();
        assert_eq!(c.model_path, PathBuf::from("./models/food_classifier"));
        assert_eq!(c.labels.len(), 20);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
model_path = "/tmp/model"
labels = ["a", "b", "c"]

[descriptor]
input_shape = [32, 32, 3]
num_classes = 3
backbone = { kind = "mobilenet_v2_lite", width = 4 }
head = [
    { type = "global_average_pool" },
    { type = "dense", units = 16, activation = "relu" },
    { type = "output" },
]

[[conversion]]
name = "only"
op_sets = ["builtins"]
representation = "int8"
"#;
        let c = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(c.model_path, PathBuf::from("/tmp/model"));
        assert_eq!(c.descriptor.num_classes(), 3);
        assert_eq!(c.descriptor.backbone().width, 4);
        assert_eq!(c.descriptor.head().len(), 3);
        assert_eq!(c.conversion.len(), 1);
        assert_eq!(c.conversion[0].representation, Representation::Int8);
        c.validate().unwrap();
    }

    #[test]
    fn test_label_count_mismatch() {
        let toml = r#"labels = ["a", "b"]"#;
        let c = PipelineConfig::from_toml(toml).unwrap();
        assert!(matches!(c.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let c = PipelineConfig::from_toml(r#"labels = ["a", "a"]"#).unwrap();
        assert!(c.label_set().is_err());
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_invalid_descriptor_rejected_at_parse() {
        let toml = r#"
[descriptor]
input_shape = [32, 32, 3]
num_classes = 0
"#;
        assert!(PipelineConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let c = PipelineConfig::default();
        let toml_str = c.to_toml().unwrap();
        let c2 = PipelineConfig::from_toml(&toml_str).unwrap();
        assert_eq!(c2.descriptor, c.descriptor);
        assert_eq!(c2.labels, c.labels);
        assert_eq!(c2.conversion, c.conversion);
        assert_eq!(c2.asset_dir, c.asset_dir);
        assert_eq!(c2.alternate_conversion, c.alternate_conversion);
        assert_eq!(c2.reconciled_model_path, c.reconciled_model_path);
    }

    #[test]
    fn test_unbuildable_head_rejected_at_parse() {
        let toml = r#"
[descriptor]
input_shape = [32, 32, 3]
num_classes = 20
head = [
    { type = "global_average_pool" },
    { type = "global_average_pool" },
    { type = "output" },
]
"#;
        assert!(matches!(
            PipelineConfig::from_toml(toml),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_empty_alternate_list_rejected() {
        let c = PipelineConfig {
            alternate_conversion: Vec::new(),
            ..PipelineConfig::default()
        };
        assert!(matches!(c.validate(), Err(PipelineError::Config(_))));
    }
}
