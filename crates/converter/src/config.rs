// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Conversion configurations.
//!
//! A configuration names one way of producing an artifact: which operator
//! sets may be used, which weight representation is requested, and whether
//! activation ranges are calibrated first. Configurations are tried in
//! order until one is accepted.
//!
//! # TOML form
//! ```toml
//! [[conversion]]
//! name = "float16-calibrated"
//! optimization = "default"
//! op_sets = ["builtins", "select_ops"]
//! representation = "float16"
//! allow_custom_ops = true
//! calibration = { num_samples = 100 }
//! ```

use std::fmt;
use tensor_core::DType;

/// Calibration draws used when a configuration does not say.
pub const DEFAULT_CALIBRATION_SAMPLES: usize = 100;

/// Whether the converter may change numeric precision at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimization {
    /// Keep everything in float32.
    None,
    /// Honour the requested representation.
    #[default]
    Default,
}

/// A family of operators a runtime can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpSet {
    /// Native kernels shipped with every runtime.
    Builtins,
    /// Extended kernels executed through a fallback library.
    SelectOps,
}

impl OpSet {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtins => "builtins",
            Self::SelectOps => "select_ops",
        }
    }
}

impl fmt::Display for OpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric representation of the stored weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    #[default]
    Float32,
    Float16,
    Int8,
}

impl Representation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float16 => "float16",
            Self::Int8 => "int8",
        }
    }

    /// Storage type of kernel tensors.
    pub fn dtype(self) -> DType {
        match self {
            Self::Float32 => DType::F32,
            Self::Float16 => DType::F16,
            Self::Int8 => DType::I8,
        }
    }

    pub fn is_reduced(self) -> bool {
        self != Self::Float32
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calibration settings of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationSettings {
    #[serde(default = "default_samples")]
    pub num_samples: usize,
}

fn default_samples() -> usize {
    DEFAULT_CALIBRATION_SAMPLES
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            num_samples: DEFAULT_CALIBRATION_SAMPLES,
        }
    }
}

/// One conversion configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversionConfig {
    pub name: String,
    #[serde(default)]
    pub optimization: Optimization,
    pub op_sets: Vec<OpSet>,
    #[serde(default)]
    pub representation: Representation,
    #[serde(default)]
    pub allow_custom_ops: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationSettings>,
}

impl ConversionConfig {
    /// Float16 weights, calibrated activations, every operator source
    /// enabled.
    pub fn float16_calibrated() -> Self {
        Self {
            name: "float16-calibrated".into(),
            optimization: Optimization::Default,
            op_sets: vec![OpSet::Builtins, OpSet::SelectOps],
            representation: Representation::Float16,
            allow_custom_ops: true,
            calibration: Some(CalibrationSettings::default()),
        }
    }

    /// Int8 weights with float activations; needs no calibration data.
    pub fn dynamic_range() -> Self {
        Self {
            name: "dynamic-range".into(),
            optimization: Optimization::Default,
            op_sets: vec![OpSet::Builtins, OpSet::SelectOps],
            representation: Representation::Int8,
            allow_custom_ops: true,
            calibration: None,
        }
    }

    /// Plain float32 using builtin operators only.
    pub fn float32_builtins() -> Self {
        Self {
            name: "float32-builtins".into(),
            optimization: Optimization::None,
            op_sets: vec![OpSet::Builtins],
            representation: Representation::Float32,
            allow_custom_ops: false,
            calibration: None,
        }
    }

    /// The default fallback order: most compact first, most compatible last.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::float16_calibrated(),
            Self::dynamic_range(),
            Self::float32_builtins(),
        ]
    }

    /// The representation actually produced. Without optimization every
    /// request falls back to float32.
    pub fn effective_representation(&self) -> Representation {
        match self.optimization {
            Optimization::None => Representation::Float32,
            Optimization::Default => self.representation,
        }
    }

    pub fn enables(&self, set: OpSet) -> bool {
        self.op_sets.contains(&set)
    }

    /// Checks that the configuration is usable at all.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("configuration name is empty".into());
        }
        if self.op_sets.is_empty() && !self.allow_custom_ops {
            return Err(format!("'{}' enables no operator source", self.name));
        }
        if let Some(cal) = &self.calibration {
            if cal.num_samples == 0 {
                return Err(format!("'{}' requests zero calibration samples", self.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_order() {
        let names: Vec<_> = ConversionConfig::defaults()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["float16-calibrated", "dynamic-range", "float32-builtins"]);
    }

    #[test]
    fn test_no_optimization_forces_float32() {
        let config = ConversionConfig {
            optimization: Optimization::None,
            ..ConversionConfig::float16_calibrated()
        };
        assert_eq!(config.effective_representation(), Representation::Float32);
        assert_eq!(
            ConversionConfig::dynamic_range().effective_representation(),
            Representation::Int8
        );
    }

    #[test]
    fn test_validate() {
        ConversionConfig::float32_builtins().validate().unwrap();

        let mut bad = ConversionConfig::float16_calibrated();
        bad.calibration = Some(CalibrationSettings { num_samples: 0 });
        assert!(bad.validate().is_err());

        let mut empty = ConversionConfig::float32_builtins();
        empty.op_sets.clear();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{ "name": "x", "op_sets": ["builtins"], "calibration": {} }"#;
        let config: ConversionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.optimization, Optimization::Default);
        assert_eq!(config.representation, Representation::Float32);
        assert!(!config.allow_custom_ops);
        assert_eq!(config.calibration.unwrap().num_samples, DEFAULT_CALIBRATION_SAMPLES);
    }
}
