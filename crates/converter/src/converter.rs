// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use crate::artifact::{Artifact, ArtifactHeader, ArtifactMetadata, OpRecord, TensorDetails, WeightRecord};
use crate::calibration::{collect_ranges, ActivationRanges, CalibrationSource};
use crate::catalog::{OpSupport, OperatorCatalog, Provider};
use crate::config::{ConversionConfig, Representation};
use crate::error::{AttemptError, ConversionError, RejectedAttempt};
use crate::lowering::{lower, Program, TargetOpKind};
use model_ir::{ModelGraph, Validated};
use tensor_core::{quant, DType};

/// An accepted conversion and the configurations rejected before it.
#[derive(Debug)]
pub struct Conversion {
    pub artifact: Artifact,
    pub rejected: Vec<RejectedAttempt>,
}

/// Converts validated graphs into [`Artifact`]s against an
/// [`OperatorCatalog`].
#[derive(Debug, Clone, Default)]
pub struct Converter {
    catalog: OperatorCatalog,
}

impl Converter {
    pub fn new(catalog: OperatorCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &OperatorCatalog {
        &self.catalog
    }

    /// Tries `configs` in order and returns the first accepted artifact.
    ///
    /// The graph is borrowed rather than consumed: the caller still needs it
    /// to retry through another conversion path and to compute the
    /// reference output the artifact is validated against.
    ///
    /// # Errors
    /// [`ConversionError::Exhausted`] when every configuration was rejected
    /// (including when `configs` is empty).
    pub fn convert(
        &self,
        graph: &ModelGraph<Validated>,
        configs: &[ConversionConfig],
        calibration: &mut dyn CalibrationSource,
    ) -> Result<Conversion, ConversionError> {
        let program = lower(graph);
        let mut rejected = Vec::new();

        for config in configs {
            tracing::info!(model = %graph.name, config = %config.name, "conversion attempt");
            match self.attempt(&program, config, calibration) {
                Ok(artifact) => {
                    tracing::info!(
                        config = %config.name,
                        representation = %artifact.metadata().representation,
                        bytes = artifact.size_bytes(),
                        "conversion accepted"
                    );
                    return Ok(Conversion { artifact, rejected });
                }
                Err(error) => {
                    tracing::warn!(config = %config.name, %error, "conversion rejected; trying next configuration");
                    rejected.push(RejectedAttempt {
                        config: config.name.clone(),
                        error,
                    });
                }
            }
        }

        Err(ConversionError::Exhausted { attempts: rejected })
    }

    /// Runs a single configuration against a lowered program.
    pub fn attempt(
        &self,
        program: &Program,
        config: &ConversionConfig,
        calibration: &mut dyn CalibrationSource,
    ) -> Result<Artifact, AttemptError> {
        config.validate().map_err(AttemptError::InvalidConfig)?;
        let representation = config.effective_representation();
        if representation != config.representation {
            tracing::debug!(
                config = %config.name,
                requested = %config.representation,
                "optimization disabled; producing float32"
            );
        }

        let supports = self.resolve_operators(program, config, representation)?;

        let ranges = match config.calibration {
            Some(settings) => Some(collect_ranges(program, calibration, settings.num_samples)?),
            None => None,
        };
        let activation_scales = activation_scales(program, ranges.as_ref(), representation)?;

        let mut blob = Vec::new();
        let mut records = Vec::with_capacity(program.ops.len());
        for ((op, support), activation_scale) in program.ops.iter().zip(&supports).zip(activation_scales) {
            let mut weights = Vec::with_capacity(op.weights.len());
            for (i, tensor) in op.weights.iter().enumerate() {
                // Kernels take the requested representation; biases stay f32.
                let dtype = if i == 0 { representation.dtype() } else { DType::F32 };
                let encoded = quant::encode(tensor.as_slice(), dtype).map_err(|source| AttemptError::Encode {
                    op: op.name.clone(),
                    source,
                })?;
                weights.push(WeightRecord {
                    shape: tensor.shape().clone(),
                    dtype,
                    scale: encoded.scale,
                    offset: blob.len(),
                    len: encoded.bytes.len(),
                });
                blob.extend_from_slice(&encoded.bytes);
            }
            records.push(OpRecord {
                name: op.name.clone(),
                kind: op.kind,
                provider: support.provider,
                stride: op.stride,
                activation: op.activation,
                inputs: op.inputs.clone(),
                weights,
                activation_scale,
            });
        }

        let header = ArtifactHeader {
            metadata: ArtifactMetadata {
                config_name: config.name.clone(),
                representation,
                calibrated: ranges.is_some(),
                input: TensorDetails {
                    name: "input".into(),
                    shape: program.input_shape.clone(),
                    dtype: DType::F32,
                },
                output: TensorDetails {
                    name: "probabilities".into(),
                    shape: program.output_shape.clone(),
                    dtype: DType::F32,
                },
                operators: program.kinds(),
            },
            ops: records,
            blob_len: blob.len(),
        };
        Ok(Artifact::assemble(header, &blob)?)
    }

    fn resolve_operators(
        &self,
        program: &Program,
        config: &ConversionConfig,
        representation: Representation,
    ) -> Result<Vec<OpSupport>, AttemptError> {
        program
            .ops
            .iter()
            .map(|op| {
                let support = *self
                    .catalog
                    .support(op.kind)
                    .ok_or(AttemptError::UnknownOperator(op.kind))?;
                let enabled = match support.provider {
                    Provider::Custom => config.allow_custom_ops,
                    provider => provider.op_set().map_or(false, |set| config.enables(set)),
                };
                if !enabled {
                    return Err(AttemptError::OperatorUnavailable {
                        op: op.kind,
                        provider: support.provider,
                    });
                }
                if !support.supports(representation) {
                    return Err(AttemptError::ReducedPrecisionUnsupported {
                        op: op.kind,
                        representation,
                    });
                }
                Ok(support)
            })
            .collect()
    }
}

/// Checks calibrated ranges against the representation and derives int8
/// activation scales. Softmax outputs stay float.
fn activation_scales(
    program: &Program,
    ranges: Option<&ActivationRanges>,
    representation: Representation,
) -> Result<Vec<Option<f32>>, AttemptError> {
    let Some(ranges) = ranges else {
        return Ok(vec![None; program.ops.len()]);
    };

    program
        .ops
        .iter()
        .zip(&ranges.max_abs)
        .map(|(op, &max_abs)| match representation {
            Representation::Float16 if !quant::fits_f16(max_abs) => Err(AttemptError::ActivationOverflow {
                op: op.name.clone(),
                max_abs,
            }),
            Representation::Int8 if op.kind != TargetOpKind::Softmax => Ok(Some(quant::int8_scale(max_abs))),
            _ => Ok(None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::SyntheticCalibration;
    use crate::config::{CalibrationSettings, OpSet, Optimization};
    use crate::error::CalibrationError;
    use model_ir::{backbone, ArchitectureDescriptor, BackboneSpec};
    use tensor_core::{Shape, Tensor};

    fn graph() -> ModelGraph<Validated> {
        let d = ArchitectureDescriptor::new(
            Shape::image(16, 16, 3),
            BackboneSpec {
                width: 4,
                ..BackboneSpec::default()
            },
            ArchitectureDescriptor::standard_head(8),
            5,
        )
        .unwrap();
        backbone::build(&d, "conv").unwrap()
    }

    fn small(mut config: ConversionConfig) -> ConversionConfig {
        if let Some(cal) = config.calibration.as_mut() {
            cal.num_samples = 3;
        }
        config
    }

    struct Broken;

    impl CalibrationSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn sample(&mut self, _: usize, _: &Shape) -> Result<Tensor, CalibrationError> {
            Err(CalibrationError("generator raised".into()))
        }
    }

    #[test]
    fn test_first_config_wins() {
        let configs: Vec<_> = ConversionConfig::defaults().into_iter().map(small).collect();
        let conv = Converter::default()
            .convert(&graph(), &configs, &mut SyntheticCalibration::new(1))
            .unwrap();
        assert!(conv.rejected.is_empty());
        let meta = conv.artifact.metadata();
        assert_eq!(meta.config_name, "float16-calibrated");
        assert_eq!(meta.representation, Representation::Float16);
        assert!(meta.calibrated);
    }

    #[test]
    fn test_falls_back_past_broken_calibration() {
        let configs: Vec<_> = ConversionConfig::defaults().into_iter().map(small).collect();
        let conv = Converter::default()
            .convert(&graph(), &configs, &mut Broken)
            .unwrap();
        assert_eq!(conv.rejected.len(), 1);
        assert!(matches!(conv.rejected[0].error, AttemptError::Calibration { sample: 0, .. }));
        assert_eq!(conv.artifact.metadata().config_name, "dynamic-range");
    }

    #[test]
    fn test_exhaustion_lists_every_attempt() {
        let configs = vec![
            small(ConversionConfig::float16_calibrated()),
            ConversionConfig {
                name: "int8-calibrated".into(),
                representation: Representation::Int8,
                ..small(ConversionConfig::float16_calibrated())
            },
        ];
        let err = Converter::default()
            .convert(&graph(), &configs, &mut Broken)
            .unwrap_err();
        let names: Vec<_> = err.attempts().iter().map(|a| a.config.as_str()).collect();
        assert_eq!(names, ["float16-calibrated", "int8-calibrated"]);
        assert!(err.to_string().contains("all 2 conversion configurations were rejected"));
    }

    #[test]
    fn test_empty_config_list_is_exhausted() {
        let err = Converter::default()
            .convert(&graph(), &[], &mut SyntheticCalibration::new(0))
            .unwrap_err();
        assert!(err.attempts().is_empty());
    }

    #[test]
    fn test_op_set_not_enabled() {
        let catalog = OperatorCatalog::default().with(
            TargetOpKind::Mean,
            OpSupport {
                provider: Provider::SelectOps,
                float16: true,
                int8: true,
            },
        );
        let program = lower(&graph());
        let err = Converter::new(catalog)
            .attempt(&program, &ConversionConfig::float32_builtins(), &mut SyntheticCalibration::new(0))
            .unwrap_err();
        assert!(matches!(
            err,
            AttemptError::OperatorUnavailable {
                op: TargetOpKind::Mean,
                provider: Provider::SelectOps
            }
        ));
    }

    #[test]
    fn test_reduced_precision_unsupported() {
        let catalog = OperatorCatalog::default().with(
            TargetOpKind::Add,
            OpSupport {
                float16: false,
                ..OpSupport::builtin()
            },
        );
        let converter = Converter::new(catalog);
        let program = lower(&graph());
        let f16 = small(ConversionConfig::float16_calibrated());
        assert!(matches!(
            converter.attempt(&program, &f16, &mut SyntheticCalibration::new(0)),
            Err(AttemptError::ReducedPrecisionUnsupported { op: TargetOpKind::Add, .. })
        ));

        // Without optimization the same request is accepted as float32.
        let plain = ConversionConfig {
            optimization: Optimization::None,
            ..f16
        };
        let artifact = converter
            .attempt(&program, &plain, &mut SyntheticCalibration::new(0))
            .unwrap();
        assert_eq!(artifact.metadata().representation, Representation::Float32);
    }

    #[test]
    fn test_custom_operator_needs_permission() {
        let catalog = OperatorCatalog::default().with(
            TargetOpKind::Softmax,
            OpSupport {
                provider: Provider::Custom,
                ..OpSupport::builtin()
            },
        );
        let converter = Converter::new(catalog);
        let program = lower(&graph());
        assert!(converter
            .attempt(&program, &ConversionConfig::float32_builtins(), &mut SyntheticCalibration::new(0))
            .is_err());
        assert!(converter
            .attempt(&program, &ConversionConfig::dynamic_range(), &mut SyntheticCalibration::new(0))
            .is_ok());
    }

    #[test]
    fn test_unknown_operator() {
        let program = lower(&graph());
        let err = Converter::new(OperatorCatalog::empty())
            .attempt(&program, &ConversionConfig::float32_builtins(), &mut SyntheticCalibration::new(0))
            .unwrap_err();
        assert!(matches!(err, AttemptError::UnknownOperator(TargetOpKind::Conv2d)));
    }

    #[test]
    fn test_float16_activation_overflow() {
        struct Huge;
        impl CalibrationSource for Huge {
            fn name(&self) -> &str {
                "huge"
            }
            fn sample(&mut self, _: usize, shape: &Shape) -> Result<Tensor, CalibrationError> {
                Ok(Tensor::full(shape.clone(), 1.0e9))
            }
        }
        let program = lower(&graph());
        let err = Converter::default()
            .attempt(&program, &small(ConversionConfig::float16_calibrated()), &mut Huge)
            .unwrap_err();
        assert!(matches!(err, AttemptError::ActivationOverflow { .. }));
    }

    #[test]
    fn test_representations_shrink_artifact() {
        let program = lower(&graph());
        let size = |config: ConversionConfig| {
            Converter::default()
                .attempt(&program, &config, &mut SyntheticCalibration::new(0))
                .unwrap()
                .size_bytes()
        };
        let f32_size = size(ConversionConfig::float32_builtins());
        let f16_size = size(small(ConversionConfig::float16_calibrated()));
        let i8_size = size(ConversionConfig::dynamic_range());
        assert!(f16_size < f32_size);
        assert!(i8_size < f16_size);
    }

    #[test]
    fn test_int8_calibrated_records_scales() {
        let config = ConversionConfig {
            name: "int8-full".into(),
            optimization: Optimization::Default,
            op_sets: vec![OpSet::Builtins],
            representation: Representation::Int8,
            allow_custom_ops: false,
            calibration: Some(CalibrationSettings { num_samples: 2 }),
        };
        let program = lower(&graph());
        let artifact = Converter::default()
            .attempt(&program, &config, &mut SyntheticCalibration::new(0))
            .unwrap();
        let scaled = artifact.ops().iter().filter(|o| o.activation_scale.is_some()).count();
        assert_eq!(scaled, program.ops.len() - 1);
        assert!(artifact.ops().last().unwrap().activation_scale.is_none());
    }
}
