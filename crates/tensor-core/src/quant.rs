// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Weight storage codecs.
//!
//! All encodings are little-endian. Int8 uses symmetric per-tensor
//! quantization: `q = round(x / scale)` clamped to `[-127, 127]`, with
//! `scale = max|x| / 127`.

use half::f16;

use crate::{DType, TensorError};

/// Largest finite value representable in IEEE 754 half precision.
pub const F16_MAX: f32 = 65504.0;

/// Symmetric int8 range limit.
const I8_LIMIT: f32 = 127.0;

/// An encoded weight buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    /// Raw little-endian bytes.
    pub bytes: Vec<u8>,
    /// Per-tensor scale, present only for [`DType::I8`].
    pub scale: Option<f32>,
}

/// Returns `true` if `value` survives a round trip through f16 without
/// overflowing to infinity.
pub fn fits_f16(value: f32) -> bool {
    value.is_finite() && value.abs() <= F16_MAX
}

/// Computes the symmetric int8 scale for a tensor whose largest magnitude
/// is `max_abs`. An all-zero tensor gets a unit scale.
pub fn int8_scale(max_abs: f32) -> f32 {
    if max_abs > 0.0 && max_abs.is_finite() {
        max_abs / I8_LIMIT
    } else {
        1.0
    }
}

/// Rounds a single value onto the int8 grid defined by `scale`.
#[inline]
fn quantize_one(x: f32, scale: f32) -> i8 {
    (x / scale).round().clamp(-I8_LIMIT, I8_LIMIT) as i8
}

/// Snaps every value onto the int8 grid and back, simulating int8
/// activation storage while staying in `f32`.
pub fn fake_quantize(values: &mut [f32], scale: f32) {
    for v in values {
        *v = f32::from(quantize_one(*v, scale)) * scale;
    }
}

/// Encodes `values` with the requested storage type.
///
/// # Errors
/// Returns [`TensorError::Numeric`] when a value is non-finite, or when it
/// exceeds the f16 range for [`DType::F16`].
pub fn encode(values: &[f32], dtype: DType) -> Result<Encoded, TensorError> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(TensorError::Numeric {
            op: "encode",
            detail: format!("non-finite weight value {bad}"),
        });
    }

    match dtype {
        DType::F32 => Ok(Encoded {
            bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            scale: None,
        }),
        DType::F16 => {
            if let Some(bad) = values.iter().find(|v| !fits_f16(**v)) {
                return Err(TensorError::Numeric {
                    op: "encode",
                    detail: format!("value {bad} exceeds the f16 range"),
                });
            }
            Ok(Encoded {
                bytes: values
                    .iter()
                    .flat_map(|v| f16::from_f32(*v).to_le_bytes())
                    .collect(),
                scale: None,
            })
        }
        DType::I8 => {
            let max_abs = values.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
            let scale = int8_scale(max_abs);
            Ok(Encoded {
                bytes: values
                    .iter()
                    .map(|v| quantize_one(*v, scale).to_le_bytes()[0])
                    .collect(),
                scale: Some(scale),
            })
        }
    }
}

/// Decodes `count` values of `dtype` from `bytes`.
///
/// # Errors
/// Returns [`TensorError::Decode`] if the byte length is wrong or an int8
/// buffer has no scale.
pub fn decode(
    bytes: &[u8],
    dtype: DType,
    scale: Option<f32>,
    count: usize,
) -> Result<Vec<f32>, TensorError> {
    let expected = count * dtype.size_bytes();
    if bytes.len() != expected {
        return Err(TensorError::Decode {
            dtype,
            detail: format!("expected {expected} bytes, got {}", bytes.len()),
        });
    }

    match dtype {
        DType::F32 => Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()),
        DType::F16 => Ok(bytes
            .chunks_exact(2)
            .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect()),
        DType::I8 => {
            let scale = scale.ok_or_else(|| TensorError::Decode {
                dtype,
                detail: "missing quantization scale".into(),
            })?;
            Ok(bytes
                .iter()
                .map(|&b| f32::from(i8::from_le_bytes([b])) * scale)
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_is_lossless() {
        let values = [1.5f32, -0.25, 1e-7, 3.0e8];
        let enc = encode(&values, DType::F32).unwrap();
        assert_eq!(enc.bytes.len(), 16);
        assert_eq!(decode(&enc.bytes, DType::F32, None, 4).unwrap(), values);
    }

    #[test]
    fn test_f16_halves_size_and_stays_close() {
        let values = [0.1f32, -2.5, 1000.0];
        let enc = encode(&values, DType::F16).unwrap();
        assert_eq!(enc.bytes.len(), 6);
        let back = decode(&enc.bytes, DType::F16, None, 3).unwrap();
        for (a, b) in values.iter().zip(&back) {
            assert!((a - b).abs() <= a.abs() * 1e-3);
        }
    }

    #[test]
    fn test_f16_rejects_overflow() {
        assert!(encode(&[1.0, 70000.0], DType::F16).is_err());
        assert!(fits_f16(F16_MAX));
        assert!(!fits_f16(F16_MAX * 2.0));
        assert!(!fits_f16(f32::NAN));
    }

    #[test]
    fn test_int8_symmetric() {
        let values = [-1.27f32, 0.0, 0.6, 1.27];
        let enc = encode(&values, DType::I8).unwrap();
        let scale = enc.scale.unwrap();
        assert!((scale - 0.01).abs() < 1e-6);
        assert_eq!(enc.bytes.len(), 4);

        let back = decode(&enc.bytes, DType::I8, enc.scale, 4).unwrap();
        for (a, b) in values.iter().zip(&back) {
            assert!((a - b).abs() <= scale / 2.0 + 1e-6);
        }
    }

    #[test]
    fn test_int8_all_zero_uses_unit_scale() {
        let enc = encode(&[0.0; 3], DType::I8).unwrap();
        assert_eq!(enc.scale, Some(1.0));
        assert_eq!(enc.bytes, vec![0, 0, 0]);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode(&[0u8; 3], DType::F32, None, 1),
            Err(TensorError::Decode { .. })
        ));
        assert!(decode(&[1u8, 2], DType::I8, None, 2).is_err());
    }

    #[test]
    fn test_encode_rejects_non_finite() {
        assert!(encode(&[f32::INFINITY], DType::F32).is_err());
    }

    #[test]
    fn test_fake_quantize_snaps_to_grid() {
        let mut v = [0.013f32, -5.0, 0.5];
        fake_quantize(&mut v, 0.01);
        assert!((v[0] - 0.01).abs() < 1e-6);
        // Clamped at -127 * scale.
        assert!((v[1] + 1.27).abs() < 1e-6);
        assert!((v[2] - 0.5).abs() < 1e-6);
    }
}
