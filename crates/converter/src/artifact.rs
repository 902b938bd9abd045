// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The on-device artifact container.
//!
//! # Layout
//! ```text
//! +--------+-------------+----------------+-------------+-------------+
//! | "ECM1" | version u32 | header_len u64 | JSON header | weight blob |
//! +--------+-------------+----------------+-------------+-------------+
//! ```
//! Integers are little-endian. The header describes every operator and
//! locates each weight tensor in the blob by offset and length.

use crate::catalog::Provider;
use crate::config::Representation;
use crate::error::ArtifactError;
use crate::lowering::{OpInput, TargetOpKind};
use model_ir::Activation;
use std::path::Path;
use tensor_core::{DType, Shape};

/// Magic bytes at the start of every artifact.
pub const ARTIFACT_MAGIC: [u8; 4] = *b"ECM1";

/// Container version written by this crate.
pub const ARTIFACT_VERSION: u32 = 1;

const PREAMBLE_LEN: usize = 4 + 4 + 8;

/// Name, shape and element type of a model input or output.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorDetails {
    pub name: String,
    pub shape: Shape,
    pub dtype: DType,
}

/// Descriptive metadata carried in the artifact header.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArtifactMetadata {
    /// Configuration that produced the artifact.
    pub config_name: String,
    /// Effective weight representation.
    pub representation: Representation,
    /// Whether activation ranges were calibrated.
    pub calibrated: bool,
    pub input: TensorDetails,
    pub output: TensorDetails,
    /// Distinct operator kinds, in first-use order.
    pub operators: Vec<TargetOpKind>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct WeightRecord {
    pub(crate) shape: Shape,
    pub(crate) dtype: DType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) scale: Option<f32>,
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct OpRecord {
    pub(crate) name: String,
    pub(crate) kind: TargetOpKind,
    pub(crate) provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) stride: Option<usize>,
    pub(crate) activation: Activation,
    pub(crate) inputs: Vec<OpInput>,
    #[serde(default)]
    pub(crate) weights: Vec<WeightRecord>,
    /// Int8 activation scale recorded during calibration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) activation_scale: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct ArtifactHeader {
    pub(crate) metadata: ArtifactMetadata,
    pub(crate) ops: Vec<OpRecord>,
    pub(crate) blob_len: usize,
}

/// A serialized, immutable conversion result.
#[derive(Debug, Clone)]
pub struct Artifact {
    bytes: Vec<u8>,
    header: ArtifactHeader,
    blob_start: usize,
}

impl Artifact {
    /// Serializes `header` followed by `blob`.
    pub(crate) fn assemble(header: ArtifactHeader, blob: &[u8]) -> Result<Self, ArtifactError> {
        check_layout(&header, blob.len())?;
        let json = serde_json::to_vec(&header)?;

        let mut bytes = Vec::with_capacity(PREAMBLE_LEN + json.len() + blob.len());
        bytes.extend_from_slice(&ARTIFACT_MAGIC);
        bytes.extend_from_slice(&ARTIFACT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(json.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&json);
        bytes.extend_from_slice(blob);

        Ok(Self {
            bytes,
            header,
            blob_start: PREAMBLE_LEN + json.len(),
        })
    }

    /// Parses and checks artifact bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ArtifactError> {
        if bytes.len() < PREAMBLE_LEN {
            return Err(ArtifactError::Truncated(format!(
                "{} bytes is shorter than the preamble",
                bytes.len()
            )));
        }
        if bytes[..4] != ARTIFACT_MAGIC {
            return Err(ArtifactError::BadMagic);
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != ARTIFACT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: version,
                supported: ARTIFACT_VERSION,
            });
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[8..PREAMBLE_LEN]);
        let header_len = usize::try_from(u64::from_le_bytes(len))
            .map_err(|_| ArtifactError::Layout("header length overflows".into()))?;
        let blob_start = PREAMBLE_LEN
            .checked_add(header_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| ArtifactError::Truncated(format!("header of {header_len} bytes")))?;

        let header: ArtifactHeader = serde_json::from_slice(&bytes[PREAMBLE_LEN..blob_start])?;
        let blob_len = bytes.len() - blob_start;
        if header.blob_len != blob_len {
            return Err(ArtifactError::Truncated(format!(
                "weight blob is {blob_len} bytes, header declares {}",
                header.blob_len
            )));
        }
        check_layout(&header, blob_len)?;

        Ok(Self {
            bytes,
            header,
            blob_start,
        })
    }

    /// Reads an artifact file.
    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.header.metadata
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Number of operators in the artifact.
    pub fn num_ops(&self) -> usize {
        self.header.ops.len()
    }

    pub(crate) fn ops(&self) -> &[OpRecord] {
        &self.header.ops
    }

    /// Bytes of one weight tensor. The range was checked at construction.
    pub(crate) fn weight_bytes(&self, record: &WeightRecord) -> &[u8] {
        let start = self.blob_start + record.offset;
        &self.bytes[start..start + record.len]
    }
}

fn check_layout(header: &ArtifactHeader, blob_len: usize) -> Result<(), ArtifactError> {
    if header.ops.is_empty() {
        return Err(ArtifactError::Layout("artifact has no operators".into()));
    }
    for (i, op) in header.ops.iter().enumerate() {
        if op.inputs.len() != op.kind.arity() {
            return Err(ArtifactError::Layout(format!(
                "operator '{}' ({}) reads {} operands, needs {}",
                op.name,
                op.kind,
                op.inputs.len(),
                op.kind.arity()
            )));
        }
        for input in &op.inputs {
            if let OpInput::Op(j) = *input {
                if j >= i {
                    return Err(ArtifactError::Layout(format!(
                        "operator '{}' reads operand {j}, which is not computed before it",
                        op.name
                    )));
                }
            }
        }
        for w in &op.weights {
            let expected = w.shape.size_bytes(w.dtype);
            if w.len != expected {
                return Err(ArtifactError::Layout(format!(
                    "weight of '{}' has {} bytes, shape {} as {} needs {expected}",
                    op.name, w.len, w.shape, w.dtype
                )));
            }
            if w.offset.checked_add(w.len).map_or(true, |end| end > blob_len) {
                return Err(ArtifactError::Layout(format!(
                    "weight of '{}' lies outside the blob",
                    op.name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(blob_len: usize) -> ArtifactHeader {
        ArtifactHeader {
            metadata: ArtifactMetadata {
                config_name: "t".into(),
                representation: Representation::Float32,
                calibrated: false,
                input: TensorDetails {
                    name: "input".into(),
                    shape: Shape::image(1, 1, 2),
                    dtype: DType::F32,
                },
                output: TensorDetails {
                    name: "output".into(),
                    shape: Shape::vector(2),
                    dtype: DType::F32,
                },
                operators: vec![TargetOpKind::Mean],
            },
            ops: vec![OpRecord {
                name: "pool".into(),
                kind: TargetOpKind::Mean,
                provider: Provider::Builtins,
                stride: None,
                activation: Activation::Linear,
                inputs: vec![OpInput::GraphInput],
                weights: vec![WeightRecord {
                    shape: Shape::vector(2),
                    dtype: DType::F32,
                    scale: None,
                    offset: 0,
                    len: 8,
                }],
                activation_scale: None,
            }],
            blob_len,
        }
    }

    #[test]
    fn test_bytes_roundtrip() {
        let a = Artifact::assemble(header(8), &[0u8; 8]).unwrap();
        assert_eq!(&a.bytes()[..4], b"ECM1");
        let b = Artifact::from_bytes(a.bytes().to_vec()).unwrap();
        assert_eq!(b.metadata(), a.metadata());
        assert_eq!(b.weight_bytes(&b.ops()[0].weights[0]).len(), 8);
    }

    #[test]
    fn test_bad_magic_and_version() {
        let a = Artifact::assemble(header(8), &[0u8; 8]).unwrap();
        let mut bytes = a.bytes().to_vec();
        bytes[0] = b'X';
        assert!(matches!(Artifact::from_bytes(bytes), Err(ArtifactError::BadMagic)));

        let mut bytes = a.bytes().to_vec();
        bytes[4] = 9;
        assert!(matches!(
            Artifact::from_bytes(bytes),
            Err(ArtifactError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn test_truncated_blob() {
        let a = Artifact::assemble(header(8), &[0u8; 8]).unwrap();
        let mut bytes = a.bytes().to_vec();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(Artifact::from_bytes(bytes), Err(ArtifactError::Truncated(_))));
        assert!(Artifact::from_bytes(vec![1, 2, 3]).is_err());
    }

    #[test]
    fn test_weight_outside_blob_rejected() {
        assert!(matches!(
            Artifact::assemble(header(4), &[0u8; 4]),
            Err(ArtifactError::Layout(_))
        ));
    }

    #[test]
    fn test_missing_operand_rejected() {
        let a = Artifact::assemble(header(8), &[0u8; 8]).unwrap();
        let mut h = a.header.clone();
        h.ops[0].inputs.clear();
        assert!(matches!(
            Artifact::assemble(h.clone(), &[0u8; 8]),
            Err(ArtifactError::Layout(_))
        ));

        // Same header framed by hand, as a corrupted file would be.
        let json = serde_json::to_vec(&h).unwrap();
        let mut bytes = ARTIFACT_MAGIC.to_vec();
        bytes.extend_from_slice(&ARTIFACT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(json.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&json);
        bytes.extend_from_slice(&[0u8; 8]);
        assert!(matches!(Artifact::from_bytes(bytes), Err(ArtifactError::Layout(_))));
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.ecm");
        let a = Artifact::assemble(header(8), &[0u8; 8]).unwrap();
        std::fs::write(&path, a.bytes()).unwrap();
        assert_eq!(Artifact::read(&path).unwrap().size_bytes(), a.size_bytes());
        assert!(matches!(
            Artifact::read(&dir.path().join("missing.ecm")),
            Err(ArtifactError::Io { .. })
        ));
    }
}
