// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Calibration data and activation range collection.

use crate::error::{AttemptError, CalibrationError};
use crate::lowering::Program;
use model_ir::synthetic_input;
use tensor_core::{Shape, Tensor};

/// Supplies representative inputs for calibration.
///
/// A source is indexed, so a calibration pass can be restarted from sample
/// zero for every configuration that asks for one.
pub trait CalibrationSource {
    /// Returns the name of this source (for logging).
    fn name(&self) -> &str;

    /// Produces sample `index`, shaped like `shape`.
    fn sample(&mut self, index: usize, shape: &Shape) -> Result<Tensor, CalibrationError>;
}

/// Uniform `[0, 1)` noise, one seed per sample.
#[derive(Debug, Clone)]
pub struct SyntheticCalibration {
    seed: u64,
}

impl SyntheticCalibration {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl CalibrationSource for SyntheticCalibration {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn sample(&mut self, index: usize, shape: &Shape) -> Result<Tensor, CalibrationError> {
        Ok(synthetic_input(shape, self.seed.wrapping_add(index as u64)))
    }
}

/// Largest absolute activation seen at each operator's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationRanges {
    pub max_abs: Vec<f32>,
    pub samples: usize,
}

/// Draws exactly `num_samples` inputs from `source` and runs each through
/// `program`, recording per-operator activation ranges.
///
/// The first failing sample aborts the pass.
pub(crate) fn collect_ranges(
    program: &Program,
    source: &mut dyn CalibrationSource,
    num_samples: usize,
) -> Result<ActivationRanges, AttemptError> {
    let mut max_abs = vec![0.0f32; program.ops.len()];

    for sample in 0..num_samples {
        let input = source
            .sample(sample, &program.input_shape)
            .map_err(|e| AttemptError::Calibration {
                sample,
                detail: e.to_string(),
            })?;
        if input.shape() != &program.input_shape {
            return Err(AttemptError::Calibration {
                sample,
                detail: format!(
                    "source '{}' produced shape {}, expected {}",
                    source.name(),
                    input.shape(),
                    program.input_shape
                ),
            });
        }
        if !input.is_finite() {
            return Err(AttemptError::Calibration {
                sample,
                detail: "sample contains non-finite values".into(),
            });
        }

        program
            .run_with(&input, |i, _, out| {
                let m = out.max_abs();
                if m > max_abs[i] || m.is_nan() {
                    max_abs[i] = m;
                }
            })
            .map_err(|source| AttemptError::CalibrationPass { sample, source })?;
    }

    tracing::debug!(source = source.name(), num_samples, "calibration ranges collected");
    Ok(ActivationRanges {
        max_abs,
        samples: num_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lowering::lower;
    use model_ir::{backbone, ArchitectureDescriptor, BackboneSpec};

    struct Counting {
        calls: usize,
        fail_at: Option<usize>,
    }

    impl CalibrationSource for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn sample(&mut self, index: usize, shape: &Shape) -> Result<Tensor, CalibrationError> {
            self.calls += 1;
            if Some(index) == self.fail_at {
                return Err(CalibrationError("generator exhausted".into()));
            }
            Ok(Tensor::full(shape.clone(), 0.5))
        }
    }

    fn program() -> Program {
        let d = ArchitectureDescriptor::new(
            Shape::image(8, 8, 3),
            BackboneSpec {
                width: 4,
                ..BackboneSpec::default()
            },
            ArchitectureDescriptor::standard_head(4),
            3,
        )
        .unwrap();
        lower(&backbone::build(&d, "cal").unwrap())
    }

    #[test]
    fn test_invoked_exactly_num_samples_times() {
        let p = program();
        let mut source = Counting {
            calls: 0,
            fail_at: None,
        };
        let ranges = collect_ranges(&p, &mut source, 7).unwrap();
        assert_eq!(source.calls, 7);
        assert_eq!(ranges.max_abs.len(), p.ops.len());
        // Softmax outputs are probabilities.
        assert!(*ranges.max_abs.last().unwrap() <= 1.0);
    }

    #[test]
    fn test_source_failure_aborts() {
        let mut source = Counting {
            calls: 0,
            fail_at: Some(2),
        };
        let err = collect_ranges(&program(), &mut source, 5).unwrap_err();
        assert!(matches!(err, AttemptError::Calibration { sample: 2, .. }));
        assert_eq!(source.calls, 3);
    }

    #[test]
    fn test_wrong_sample_shape_rejected() {
        struct Wrong;
        impl CalibrationSource for Wrong {
            fn name(&self) -> &str {
                "wrong"
            }
            fn sample(&mut self, _: usize, _: &Shape) -> Result<Tensor, CalibrationError> {
                Ok(Tensor::zeros(Shape::image(2, 2, 3)))
            }
        }
        let err = collect_ranges(&program(), &mut Wrong, 1).unwrap_err();
        assert!(err.to_string().contains("produced shape"));
    }

    #[test]
    fn test_synthetic_source_is_restartable() {
        let shape = Shape::image(4, 4, 3);
        let mut a = SyntheticCalibration::new(9);
        let first = a.sample(0, &shape).unwrap();
        let _ = a.sample(1, &shape).unwrap();
        assert_eq!(a.sample(0, &shape).unwrap(), first);
    }
}
