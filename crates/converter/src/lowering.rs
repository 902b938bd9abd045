// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lowering of a validated graph into target operators.
//!
//! ```text
//! conv2d            -> CONV_2D
//! depthwise_conv2d  -> DEPTHWISE_CONV_2D
//! add               -> ADD
//! global_avg_pool   -> MEAN
//! dropout           -> (removed, consumers rewired)
//! dense             -> FULLY_CONNECTED
//! dense + softmax   -> FULLY_CONNECTED, SOFTMAX
//! ```

use crate::error::ExecError;
use model_ir::{apply_activation, Activation, LayerOp, ModelGraph, Validated};
use std::collections::HashMap;
use std::fmt;
use tensor_core::{
    add, conv2d, dense, depthwise_conv2d, global_avg_pool, softmax, Shape, Tensor, TensorError,
};

/// Operators understood by the target runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOpKind {
    Conv2d,
    DepthwiseConv2d,
    Add,
    Mean,
    FullyConnected,
    Softmax,
}

impl TargetOpKind {
    pub const ALL: [TargetOpKind; 6] = [
        Self::Conv2d,
        Self::DepthwiseConv2d,
        Self::Add,
        Self::Mean,
        Self::FullyConnected,
        Self::Softmax,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conv2d => "CONV_2D",
            Self::DepthwiseConv2d => "DEPTHWISE_CONV_2D",
            Self::Add => "ADD",
            Self::Mean => "MEAN",
            Self::FullyConnected => "FULLY_CONNECTED",
            Self::Softmax => "SOFTMAX",
        }
    }

    /// Number of operands the operator reads.
    pub fn arity(self) -> usize {
        match self {
            Self::Add => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for TargetOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an operator reads one of its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpInput {
    GraphInput,
    Op(usize),
}

/// One target operator with its (float) weights.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredOp {
    /// Name of the graph layer it came from (`.softmax` suffix for split
    /// activations).
    pub name: String,
    pub kind: TargetOpKind,
    pub stride: Option<usize>,
    pub activation: Activation,
    pub inputs: Vec<OpInput>,
    pub weights: Vec<Tensor>,
}

/// An executable operator sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub input_shape: Shape,
    pub output_shape: Shape,
    pub ops: Vec<LoweredOp>,
}

/// Lowers a validated graph.
pub fn lower(graph: &ModelGraph<Validated>) -> Program {
    let index: HashMap<&str, usize> = graph
        .iter_nodes()
        .enumerate()
        .map(|(i, n)| (n.name.as_str(), i))
        .collect();
    // Operand that carries each graph node's output.
    let mut produced: Vec<OpInput> = Vec::with_capacity(graph.num_nodes());
    let mut ops: Vec<LoweredOp> = Vec::with_capacity(graph.num_nodes());

    for (i, node) in graph.iter_nodes().enumerate() {
        let inputs: Vec<OpInput> = if node.inputs.is_empty() {
            vec![if i == 0 { OpInput::GraphInput } else { produced[i - 1] }]
        } else {
            // Validation guarantees every name refers to an earlier node.
            node.inputs
                .iter()
                .map(|name| index.get(name.as_str()).map_or(OpInput::GraphInput, |&j| produced[j]))
                .collect()
        };

        let mut push = |op: LoweredOp| {
            ops.push(op);
            OpInput::Op(ops.len() - 1)
        };
        let weights = node.weights().to_vec();
        let out = match &node.op {
            LayerOp::Dropout { .. } => inputs[0],
            LayerOp::Conv2d {
                stride, activation, ..
            } => push(LoweredOp {
                name: node.name.clone(),
                kind: TargetOpKind::Conv2d,
                stride: Some(*stride),
                activation: *activation,
                inputs,
                weights,
            }),
            LayerOp::DepthwiseConv2d {
                stride, activation, ..
            } => push(LoweredOp {
                name: node.name.clone(),
                kind: TargetOpKind::DepthwiseConv2d,
                stride: Some(*stride),
                activation: *activation,
                inputs,
                weights,
            }),
            LayerOp::Add => push(LoweredOp {
                name: node.name.clone(),
                kind: TargetOpKind::Add,
                stride: None,
                activation: Activation::Linear,
                inputs,
                weights,
            }),
            LayerOp::GlobalAveragePool => push(LoweredOp {
                name: node.name.clone(),
                kind: TargetOpKind::Mean,
                stride: None,
                activation: Activation::Linear,
                inputs,
                weights,
            }),
            LayerOp::Dense { activation, .. } => {
                let split = *activation == Activation::Softmax;
                let fc = push(LoweredOp {
                    name: node.name.clone(),
                    kind: TargetOpKind::FullyConnected,
                    stride: None,
                    activation: if split { Activation::Linear } else { *activation },
                    inputs,
                    weights,
                });
                if split {
                    push(LoweredOp {
                        name: format!("{}.softmax", node.name),
                        kind: TargetOpKind::Softmax,
                        stride: None,
                        activation: Activation::Linear,
                        inputs: vec![fc],
                        weights: Vec::new(),
                    })
                } else {
                    fc
                }
            }
        };
        produced.push(out);
    }

    Program {
        input_shape: graph.input_shape().clone(),
        output_shape: Shape::vector(graph.num_classes()),
        ops,
    }
}

fn operand<'a>(op: &LoweredOp, args: &[&'a Tensor], i: usize) -> Result<&'a Tensor, TensorError> {
    args.get(i).copied().ok_or_else(|| TensorError::Numeric {
        op: "dispatch",
        detail: format!(
            "{} reads {} operands, needs {}",
            op.kind,
            args.len(),
            op.kind.arity()
        ),
    })
}

fn weight(op: &LoweredOp, i: usize) -> Result<&Tensor, TensorError> {
    op.weights.get(i).ok_or_else(|| TensorError::Numeric {
        op: "dispatch",
        detail: format!("{} carries {} weights", op.kind, op.weights.len()),
    })
}

fn run_op(op: &LoweredOp, args: &[&Tensor]) -> Result<Tensor, TensorError> {
    let stride = op.stride.unwrap_or(1);
    let x = operand(op, args, 0)?;
    let mut out = match op.kind {
        TargetOpKind::Conv2d => conv2d(x, weight(op, 0)?, weight(op, 1)?, stride)?,
        TargetOpKind::DepthwiseConv2d => {
            depthwise_conv2d(x, weight(op, 0)?, weight(op, 1)?, stride)?
        }
        TargetOpKind::Add => add(x, operand(op, args, 1)?)?,
        TargetOpKind::Mean => global_avg_pool(x)?,
        TargetOpKind::FullyConnected => dense(x, weight(op, 0)?, weight(op, 1)?)?,
        TargetOpKind::Softmax => {
            let mut out = Tensor::zeros(x.shape().clone());
            softmax(x, &mut out)?;
            out
        }
    };
    apply_activation(&mut out, op.activation)?;
    Ok(out)
}

impl Program {
    /// Distinct operator kinds in first-use order.
    pub fn kinds(&self) -> Vec<TargetOpKind> {
        let mut kinds = Vec::new();
        for op in &self.ops {
            if !kinds.contains(&op.kind) {
                kinds.push(op.kind);
            }
        }
        kinds
    }

    pub fn run(&self, input: &Tensor) -> Result<Tensor, ExecError> {
        self.run_with(input, |_, _, _| {})
    }

    /// Runs the program, handing every operator's output to `after` before
    /// any consumer reads it. `after` may rewrite the values in place.
    pub fn run_with<F>(&self, input: &Tensor, mut after: F) -> Result<Tensor, ExecError>
    where
        F: FnMut(usize, &LoweredOp, &mut Tensor),
    {
        if input.shape() != &self.input_shape {
            return Err(ExecError::InputShape {
                expected: self.input_shape.clone(),
                actual: input.shape().clone(),
            });
        }

        let mut outputs: Vec<Tensor> = Vec::with_capacity(self.ops.len());
        for (i, op) in self.ops.iter().enumerate() {
            let args = op
                .inputs
                .iter()
                .map(|src| match *src {
                    OpInput::GraphInput => Ok(input),
                    OpInput::Op(j) if j < i => Ok(&outputs[j]),
                    OpInput::Op(j) => Err(ExecError::Op {
                        op: op.name.clone(),
                        source: TensorError::Numeric {
                            op: "dispatch",
                            detail: format!("operand {j} is not computed before operator {i}"),
                        },
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let mut out = run_op(op, &args).map_err(|source| ExecError::Op {
                op: op.name.clone(),
                source,
            })?;
            after(i, op, &mut out);
            outputs.push(out);
        }

        let out = outputs.pop().ok_or_else(|| ExecError::Op {
            op: "<empty>".into(),
            source: TensorError::Numeric {
                op: "dispatch",
                detail: "program has no operators".into(),
            },
        })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{backbone, synthetic_input, ArchitectureDescriptor, BackboneSpec};

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
        backbone::build(&d, "lower").unwrap()
    }

    #[test]
    fn test_dropout_removed_and_softmax_split() {
        let g = graph();
        let p = lower(&g);
        // Two dropouts removed, one softmax added.
        assert_eq!(p.ops.len(), g.num_nodes() - 1);
        let last = p.ops.last().unwrap();
        assert_eq!(last.kind, TargetOpKind::Softmax);
        assert_eq!(last.name, "head.predictions.softmax");
        let fc = &p.ops[p.ops.len() - 2];
        assert_eq!(fc.kind, TargetOpKind::FullyConnected);
        assert_eq!(fc.activation, Activation::Linear);
    }

    #[test]
    fn test_kinds_first_use_order() {
        let kinds = lower(&graph()).kinds();
        assert_eq!(
            kinds,
            vec![
                TargetOpKind::Conv2d,
                TargetOpKind::DepthwiseConv2d,
                TargetOpKind::Add,
                TargetOpKind::Mean,
                TargetOpKind::FullyConnected,
                TargetOpKind::Softmax,
            ]
        );
    }

    #[test]
    fn test_program_matches_reference_forward() {
        let g = graph();
        let p = lower(&g);
        let input = synthetic_input(g.input_shape(), 4);
        assert_eq!(p.run(&input).unwrap(), g.forward(&input).unwrap());
    }

    #[test]
    fn test_missing_operand_is_an_error() {
        let g = graph();
        let mut p = lower(&g);
        let add = p
            .ops
            .iter()
            .position(|op| op.kind == TargetOpKind::Add)
            .unwrap();
        p.ops[add].inputs.truncate(1);
        let input = synthetic_input(g.input_shape(), 4);
        assert!(matches!(p.run(&input), Err(ExecError::Op { .. })));

        p.ops[add].inputs.clear();
        assert!(matches!(p.run(&input), Err(ExecError::Op { .. })));
    }

    #[test]
    fn test_arity() {
        assert_eq!(TargetOpKind::Add.arity(), 2);
        assert!(TargetOpKind::ALL
            .iter()
            .filter(|k| **k != TargetOpKind::Add)
            .all(|k| k.arity() == 1));
    }

    #[test]
    fn test_residual_operands_resolved() {
        let p = lower(&graph());
        let add = p.ops.iter().find(|o| o.kind == TargetOpKind::Add).unwrap();
        assert_eq!(add.inputs.len(), 2);
        assert!(add.inputs.iter().all(|i| matches!(i, OpInput::Op(_))));
    }

    #[test]
    fn test_run_rejects_wrong_input() {
        let p = lower(&graph());
        assert!(matches!(
            p.run(&Tensor::zeros(Shape::image(4, 4, 3))),
            Err(ExecError::InputShape { .. })
        ));
    }
}
