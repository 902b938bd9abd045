// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Executes artifacts the way an on-device runtime would.
//!
//! Weights are dequantized to `f32` at load time. When the artifact carries
//! int8 activation scales, every scaled operator output is snapped onto its
//! int8 grid before the next operator reads it.

use crate::artifact::{Artifact, TensorDetails};
use crate::catalog::Provider;
use crate::config::OpSet;
use crate::error::{ArtifactError, InterpreterError};
use crate::lowering::{LoweredOp, Program, TargetOpKind};
use tensor_core::{quant, Tensor};

/// Operator sources available in a runtime.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeOps {
    pub op_sets: Vec<OpSet>,
    #[serde(default)]
    pub allow_custom_ops: bool,
}

impl Default for RuntimeOps {
    fn default() -> Self {
        Self {
            op_sets: vec![OpSet::Builtins, OpSet::SelectOps],
            allow_custom_ops: true,
        }
    }
}

impl RuntimeOps {
    /// A runtime with only the builtin kernels.
    pub fn builtins_only() -> Self {
        Self {
            op_sets: vec![OpSet::Builtins],
            allow_custom_ops: false,
        }
    }

    pub fn provides(&self, provider: Provider) -> bool {
        match provider.op_set() {
            Some(set) => self.op_sets.contains(&set),
            None => self.allow_custom_ops,
        }
    }
}

/// A loaded artifact, ready to invoke.
#[derive(Debug)]
pub struct ArtifactInterpreter {
    program: Program,
    activation_scales: Vec<Option<f32>>,
    input: TensorDetails,
    output: TensorDetails,
}

fn expected_weights(kind: TargetOpKind) -> usize {
    match kind {
        TargetOpKind::Conv2d | TargetOpKind::DepthwiseConv2d | TargetOpKind::FullyConnected => 2,
        TargetOpKind::Add | TargetOpKind::Mean | TargetOpKind::Softmax => 0,
    }
}

impl ArtifactInterpreter {
    /// Loads `artifact` into a runtime offering `runtime`.
    ///
    /// # Errors
    /// [`InterpreterError::UnsupportedOperator`] for the first operator the
    /// runtime cannot provide, or an [`ArtifactError`] if a weight tensor
    /// cannot be decoded.
    pub fn new(artifact: &Artifact, runtime: &RuntimeOps) -> Result<Self, InterpreterError> {
        let mut ops = Vec::with_capacity(artifact.num_ops());
        let mut activation_scales = Vec::with_capacity(artifact.num_ops());

        for record in artifact.ops() {
            if !runtime.provides(record.provider) {
                return Err(InterpreterError::UnsupportedOperator {
                    layer: record.name.clone(),
                    op: record.kind,
                    provider: record.provider,
                });
            }
            if record.weights.len() != expected_weights(record.kind) {
                return Err(ArtifactError::Layout(format!(
                    "operator '{}' ({}) carries {} weights",
                    record.name,
                    record.kind,
                    record.weights.len()
                ))
                .into());
            }

            let weights = record
                .weights
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let name = format!("{}[{i}]", record.name);
                    let values = quant::decode(
                        artifact.weight_bytes(w),
                        w.dtype,
                        w.scale,
                        w.shape.num_elements(),
                    )
                    .map_err(|source| ArtifactError::Decode {
                        name: name.clone(),
                        source,
                    })?;
                    Tensor::from_vec(w.shape.clone(), values)
                        .map_err(|source| ArtifactError::Decode { name, source })
                })
                .collect::<Result<Vec<_>, _>>()?;

            ops.push(LoweredOp {
                name: record.name.clone(),
                kind: record.kind,
                stride: record.stride,
                activation: record.activation,
                inputs: record.inputs.clone(),
                weights,
            });
            activation_scales.push(record.activation_scale);
        }

        let meta = artifact.metadata();
        tracing::debug!(
            config = %meta.config_name,
            ops = ops.len(),
            "artifact loaded into interpreter"
        );
        Ok(Self {
            program: Program {
                input_shape: meta.input.shape.clone(),
                output_shape: meta.output.shape.clone(),
                ops,
            },
            activation_scales,
            input: meta.input.clone(),
            output: meta.output.clone(),
        })
    }

    pub fn input_details(&self) -> &TensorDetails {
        &self.input
    }

    pub fn output_details(&self) -> &TensorDetails {
        &self.output
    }

    /// Runs one inference.
    pub fn invoke(&self, input: &Tensor) -> Result<Tensor, InterpreterError> {
        let scales = &self.activation_scales;
        let out = self.program.run_with(input, |i, _, out| {
            if let Some(scale) = scales[i] {
                quant::fake_quantize(out.as_mut_slice(), scale);
            }
        })?;
        if out.shape() != &self.output.shape {
            return Err(InterpreterError::OutputShape {
                expected: self.output.shape.clone(),
                actual: out.shape().clone(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::SyntheticCalibration;
    use crate::catalog::{OpSupport, OperatorCatalog};
    use crate::config::{CalibrationSettings, ConversionConfig, Representation};
    use crate::lowering::lower;
    use crate::Converter;
    use model_ir::{backbone, synthetic_input, ArchitectureDescriptor, BackboneSpec, ModelGraph, Validated};
    use tensor_core::Shape;

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
        backbone::build(&d, "interp").unwrap()
    }

    fn convert(converter: &Converter, config: ConversionConfig) -> Artifact {
        converter
            .attempt(&lower(&graph()), &config, &mut SyntheticCalibration::new(3))
            .unwrap()
    }

    #[test]
    fn test_float32_matches_reference_exactly() {
        let g = graph();
        let artifact = convert(&Converter::default(), ConversionConfig::float32_builtins());
        let interp = ArtifactInterpreter::new(&artifact, &RuntimeOps::default()).unwrap();
        assert_eq!(interp.input_details().shape, Shape::image(16, 16, 3));
        assert_eq!(interp.output_details().shape, Shape::vector(5));

        let input = synthetic_input(g.input_shape(), 8);
        assert_eq!(interp.invoke(&input).unwrap(), g.forward(&input).unwrap());
    }

    #[test]
    fn test_reduced_precision_stays_close() {
        let g = graph();
        let input = synthetic_input(g.input_shape(), 8);
        let reference = g.forward(&input).unwrap();

        let mut f16 = ConversionConfig::float16_calibrated();
        f16.calibration = Some(CalibrationSettings { num_samples: 2 });
        for config in [f16, ConversionConfig::dynamic_range()] {
            let artifact = convert(&Converter::default(), config);
            let out = ArtifactInterpreter::new(&artifact, &RuntimeOps::default())
                .unwrap()
                .invoke(&input)
                .unwrap();
            assert!((out.sum() - 1.0).abs() < 1e-3);
            for (a, b) in out.as_slice().iter().zip(reference.as_slice()) {
                assert!((a - b).abs() < 0.05, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_int8_activations_are_quantized() {
        let g = graph();
        let mut config = ConversionConfig::dynamic_range();
        config.calibration = Some(CalibrationSettings { num_samples: 2 });
        let artifact = convert(&Converter::default(), config);
        assert_eq!(artifact.metadata().representation, Representation::Int8);

        let interp = ArtifactInterpreter::new(&artifact, &RuntimeOps::default()).unwrap();
        let input = synthetic_input(g.input_shape(), 1);
        let a = interp.invoke(&input).unwrap();
        assert_eq!(a, interp.invoke(&input).unwrap());
        assert!((a.sum() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_runtime_without_select_ops_rejects_artifact() {
        let catalog = OperatorCatalog::default().with(
            TargetOpKind::Mean,
            OpSupport {
                provider: Provider::SelectOps,
                ..OpSupport::builtin()
            },
        );
        let artifact = convert(&Converter::new(catalog), ConversionConfig::dynamic_range());
        let err = ArtifactInterpreter::new(&artifact, &RuntimeOps::builtins_only()).unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::UnsupportedOperator {
                op: TargetOpKind::Mean,
                ..
            }
        ));
        assert!(ArtifactInterpreter::new(&artifact, &RuntimeOps::default()).is_ok());
    }

    #[test]
    fn test_invoke_rejects_wrong_input() {
        let artifact = convert(&Converter::default(), ConversionConfig::float32_builtins());
        let interp = ArtifactInterpreter::new(&artifact, &RuntimeOps::default()).unwrap();
        assert!(matches!(
            interp.invoke(&Tensor::zeros(Shape::image(8, 8, 3))),
            Err(InterpreterError::Execution(_))
        ));
    }
}
