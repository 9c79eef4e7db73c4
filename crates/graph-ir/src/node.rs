// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph nodes and the `NodeInfo` view backends use for legality checks.

use tensor_core::{ElemKind, Type};

/// The operation a [`Node`] performs.
///
/// The set is closed: backends answer support queries with an exhaustive
/// match, and kinds they do not list fall through to "unsupported".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Add,
    Mul,
    Sub,
    Div,
    Max,
    Min,
    Pow,
    Modulo,
    MatMul,
    FullyConnected,
    BatchedAdd,
    BatchedReduceAdd,
    BatchedReduceMin,
    Convolution,
    AvgPool,
    MaxPool,
    AdaptiveAvgPool,
    Reshape,
    Transpose,
    Concat,
    Slice,
    Splat,
    Touch,
    Flip,
    Select,
    Gather,
    ScatterData,
    TopK,
    ArgMax,
    ArgMin,
    SoftMax,
    Log,
    Exp,
    Tanh,
    Sigmoid,
    Abs,
    Neg,
    Floor,
    Ceil,
    Round,
    Sqrt,
    Rsqrt,
    Reciprocal,
    Sin,
    Cos,
    Not,
    And,
    Or,
    Xor,
    CmpEq,
    CmpNeq,
    CmpLt,
    CmpLte,
    IsNaN,
    Quantize,
    Dequantize,
    RescaleQuantized,
    IntLookupTable,
    ConvertTo,
    SparseLengthsSum,
    SparseLengthsWeightedSum,
    LengthsSum,
    LengthsToRanges,
    LengthsRangeFill,
    EmbeddingBag,
    SpaceToDepth,
    ResizeNearest,
    ResizeBilinear,
    LayerNorm,
    Erf,
    HardSwish,
}

impl NodeKind {
    /// Returns the snake_case label used in manifests and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Add => "add",
            NodeKind::Mul => "mul",
            NodeKind::Sub => "sub",
            NodeKind::Div => "div",
            NodeKind::Max => "max",
            NodeKind::Min => "min",
            NodeKind::Pow => "pow",
            NodeKind::Modulo => "modulo",
            NodeKind::MatMul => "mat_mul",
            NodeKind::FullyConnected => "fully_connected",
            NodeKind::BatchedAdd => "batched_add",
            NodeKind::BatchedReduceAdd => "batched_reduce_add",
            NodeKind::BatchedReduceMin => "batched_reduce_min",
            NodeKind::Convolution => "convolution",
            NodeKind::AvgPool => "avg_pool",
            NodeKind::MaxPool => "max_pool",
            NodeKind::AdaptiveAvgPool => "adaptive_avg_pool",
            NodeKind::Reshape => "reshape",
            NodeKind::Transpose => "transpose",
            NodeKind::Concat => "concat",
            NodeKind::Slice => "slice",
            NodeKind::Splat => "splat",
            NodeKind::Touch => "touch",
            NodeKind::Flip => "flip",
            NodeKind::Select => "select",
            NodeKind::Gather => "gather",
            NodeKind::ScatterData => "scatter_data",
            NodeKind::TopK => "top_k",
            NodeKind::ArgMax => "arg_max",
            NodeKind::ArgMin => "arg_min",
            NodeKind::SoftMax => "soft_max",
            NodeKind::Log => "log",
            NodeKind::Exp => "exp",
            NodeKind::Tanh => "tanh",
            NodeKind::Sigmoid => "sigmoid",
            NodeKind::Abs => "abs",
            NodeKind::Neg => "neg",
            NodeKind::Floor => "floor",
            NodeKind::Ceil => "ceil",
            NodeKind::Round => "round",
            NodeKind::Sqrt => "sqrt",
            NodeKind::Rsqrt => "rsqrt",
            NodeKind::Reciprocal => "reciprocal",
            NodeKind::Sin => "sin",
            NodeKind::Cos => "cos",
            NodeKind::Not => "not",
            NodeKind::And => "and",
            NodeKind::Or => "or",
            NodeKind::Xor => "xor",
            NodeKind::CmpEq => "cmp_eq",
            NodeKind::CmpNeq => "cmp_neq",
            NodeKind::CmpLt => "cmp_lt",
            NodeKind::CmpLte => "cmp_lte",
            NodeKind::IsNaN => "is_nan",
            NodeKind::Quantize => "quantize",
            NodeKind::Dequantize => "dequantize",
            NodeKind::RescaleQuantized => "rescale_quantized",
            NodeKind::IntLookupTable => "int_lookup_table",
            NodeKind::ConvertTo => "convert_to",
            NodeKind::SparseLengthsSum => "sparse_lengths_sum",
            NodeKind::SparseLengthsWeightedSum => "sparse_lengths_weighted_sum",
            NodeKind::LengthsSum => "lengths_sum",
            NodeKind::LengthsToRanges => "lengths_to_ranges",
            NodeKind::LengthsRangeFill => "lengths_range_fill",
            NodeKind::EmbeddingBag => "embedding_bag",
            NodeKind::SpaceToDepth => "space_to_depth",
            NodeKind::ResizeNearest => "resize_nearest",
            NodeKind::ResizeBilinear => "resize_bilinear",
            NodeKind::LayerNorm => "layer_norm",
            NodeKind::Erf => "erf",
            NodeKind::HardSwish => "hard_swish",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single operation in a [`crate::Function`].
///
/// Inputs are referenced by name and resolve, in order, against earlier
/// nodes, function input placeholders, and module constants. The input and
/// output types are stored explicitly so legality checks need no lookups.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Unique name within the owning function.
    pub name: String,
    /// Operation kind.
    pub kind: NodeKind,
    /// Names of the values consumed, in slot order.
    pub inputs: Vec<String>,
    /// Types of the consumed values (parallel to `inputs`).
    pub input_tys: Vec<Type>,
    /// Types of the produced values.
    pub output_tys: Vec<Type>,
}

impl Node {
    /// Returns the legality-check view of this node.
    pub fn info(&self) -> NodeInfo<'_> {
        NodeInfo {
            kind: self.kind,
            input_tys: &self.input_tys,
            output_tys: &self.output_tys,
        }
    }

    /// Total byte footprint of the node's outputs.
    pub fn output_bytes(&self) -> usize {
        self.output_tys.iter().map(Type::size_bytes).sum()
    }
}

/// A borrowed view of a node's kind and slot types, used by backends to
/// answer `is_op_supported`.
#[derive(Debug, Clone, Copy)]
pub struct NodeInfo<'a> {
    pub kind: NodeKind,
    pub input_tys: &'a [Type],
    pub output_tys: &'a [Type],
}

impl<'a> NodeInfo<'a> {
    /// Constructs a standalone view (mostly for tests).
    pub fn new(kind: NodeKind, input_tys: &'a [Type], output_tys: &'a [Type]) -> Self {
        Self {
            kind,
            input_tys,
            output_tys,
        }
    }

    /// Element kind of input slot `idx`, if present.
    pub fn in_elem(&self, idx: usize) -> Option<ElemKind> {
        self.input_tys.get(idx).map(|t| t.elem)
    }

    /// Element kind of output slot `idx`, if present.
    pub fn out_elem(&self, idx: usize) -> Option<ElemKind> {
        self.output_tys.get(idx).map(|t| t.elem)
    }

    /// Type of input slot `idx`, if present.
    pub fn in_ty(&self, idx: usize) -> Option<&Type> {
        self.input_tys.get(idx)
    }

    /// Returns `true` when every input and output slot, except the listed
    /// exceptions, shares one element kind drawn from `allowed`.
    ///
    /// This is the workhorse of backend legality tables: most node kinds are
    /// legal exactly when all their slots agree on one of a few kinds, with
    /// an index or predicate slot carved out.
    pub fn all_same_elem_kind(
        &self,
        allowed: &[ElemKind],
        ignore_inputs: &[usize],
        ignore_outputs: &[usize],
    ) -> bool {
        let mut common: Option<ElemKind> = None;
        for (i, ty) in self.input_tys.iter().enumerate() {
            if ignore_inputs.contains(&i) {
                continue;
            }
            match common {
                None => common = Some(ty.elem),
                Some(k) if k == ty.elem => {}
                Some(_) => return false,
            }
        }
        for (i, ty) in self.output_tys.iter().enumerate() {
            if ignore_outputs.contains(&i) {
                continue;
            }
            match common {
                None => common = Some(ty.elem),
                Some(k) if k == ty.elem => {}
                Some(_) => return false,
            }
        }
        match common {
            Some(k) => allowed.contains(&k),
            // A node with every slot ignored has nothing to disagree on.
            None => true,
        }
    }
}
