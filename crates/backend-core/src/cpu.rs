// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The reference CPU backend.
//!
//! `is_op_supported` is a fixed legality table: per node kind, the set of
//! element-kind combinations the CPU kernels implement. The table is total
//! over [`NodeKind`]; kinds without an arm are unsupported.

use crate::{Backend, BackendError, CompiledFunction, SimulatedFunction};
use graph_ir::{BackendOptions, Function, Node, NodeInfo, NodeKind, PrecisionConfiguration};
use tensor_core::ElemKind;
use tensor_core::ElemKind::{Bool, Float, Int16Q, Int32I, Int32Q, Int64I, Int8Q};

// Input slot positions for the kinds with carve-outs.
const CONV_BIAS_IN: usize = 2;
const FC_BIAS_IN: usize = 2;
const BATCHED_ADD_SLICE_IN: usize = 1;
const GATHER_INDICES_IN: usize = 1;
const SCATTER_INDICES_IN: usize = 1;
const SELECT_COND_IN: usize = 0;
const SOFTMAX_SELECTED_IN: usize = 1;
const SLS_INDICES_IN: usize = 1;
const SLS_LENGTHS_IN: usize = 2;
const SLWS_INDICES_IN: usize = 2;
const SLWS_LENGTHS_IN: usize = 3;
const EMBEDDING_BAG_INDICES_IN: usize = 2;
const EMBEDDING_BAG_OFFSETS_IN: usize = 3;
const LENGTHS_SUM_LENGTHS_IN: usize = 1;
const CMP_RESULT_OUT: usize = 0;
const ARG_MAX_RESULT_OUT: usize = 0;
const MAX_POOL_ARGMAX_OUT: usize = 1;
const TOPK_INDICES_OUT: usize = 1;

fn is_index(elem: Option<ElemKind>) -> bool {
    matches!(elem, Some(Int32I) | Some(Int64I))
}

/// The in-process CPU backend.
#[derive(Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub const NAME: &'static str = "cpu";

    /// Number of CPU devices worth provisioning on this host.
    pub fn num_devices() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_op_supported(&self, ni: &NodeInfo<'_>) -> bool {
        match ni.kind {
            NodeKind::BatchedReduceMin => {
                ni.all_same_elem_kind(&[Float, Int32I, Int64I], &[], &[])
            }

            NodeKind::Add | NodeKind::Mul => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int32I, Int64I], &[], &[])
            }

            NodeKind::Sub
            | NodeKind::Max
            | NodeKind::Min
            | NodeKind::BatchedReduceAdd
            | NodeKind::MatMul
            | NodeKind::AvgPool => ni.all_same_elem_kind(&[Float, Int8Q], &[], &[]),

            NodeKind::AdaptiveAvgPool => ni.all_same_elem_kind(&[Float], &[], &[]),

            NodeKind::MaxPool => {
                ni.all_same_elem_kind(&[Float, Int8Q], &[], &[MAX_POOL_ARGMAX_OUT])
                    && ni
                        .out_elem(MAX_POOL_ARGMAX_OUT)
                        .map_or(true, |e| e == Int64I || e == Int32I)
            }

            NodeKind::ArgMax | NodeKind::ArgMin => {
                ni.all_same_elem_kind(&[Float, Int8Q], &[], &[ARG_MAX_RESULT_OUT])
                    && is_index(ni.out_elem(ARG_MAX_RESULT_OUT))
            }

            NodeKind::ResizeNearest | NodeKind::ResizeBilinear => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int32Q, Int32I, Int64I], &[], &[])
            }

            // Implemented via a plain copy.
            NodeKind::Reshape => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int32Q, Int32I, Int64I, Bool], &[], &[])
            }

            NodeKind::Concat | NodeKind::Splat | NodeKind::Touch => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int64I, Int32I, Bool], &[], &[])
            }

            NodeKind::Slice => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int32Q, Int32I, Int64I], &[], &[])
            }

            NodeKind::SpaceToDepth | NodeKind::Div => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int64I, Int32I], &[], &[])
            }

            NodeKind::Transpose => ni.all_same_elem_kind(&[Float, Int8Q, Int64I, Bool], &[], &[]),

            NodeKind::Flip => ni.all_same_elem_kind(
                &[Float, Int8Q, Int16Q, Int32Q, Int32I, Int64I, Bool],
                &[],
                &[],
            ),

            NodeKind::SparseLengthsSum => {
                ni.all_same_elem_kind(&[Float], &[SLS_INDICES_IN, SLS_LENGTHS_IN], &[])
                    && is_index(ni.in_elem(SLS_INDICES_IN))
                    && ni.in_elem(SLS_LENGTHS_IN) == Some(Int32I)
            }

            NodeKind::SparseLengthsWeightedSum => {
                ni.all_same_elem_kind(&[Float], &[SLWS_INDICES_IN, SLWS_LENGTHS_IN], &[])
                    && is_index(ni.in_elem(SLWS_INDICES_IN))
                    && ni.in_elem(SLWS_LENGTHS_IN) == Some(Int32I)
            }

            NodeKind::EmbeddingBag => {
                ni.all_same_elem_kind(
                    &[Float],
                    &[EMBEDDING_BAG_INDICES_IN, EMBEDDING_BAG_OFFSETS_IN],
                    &[],
                ) && ni.in_elem(EMBEDDING_BAG_INDICES_IN) == Some(Int64I)
                    && ni.in_elem(EMBEDDING_BAG_OFFSETS_IN) == Some(Int64I)
            }

            NodeKind::LengthsRangeFill | NodeKind::LengthsToRanges => {
                ni.all_same_elem_kind(&[Int32I], &[], &[])
            }

            NodeKind::IntLookupTable | NodeKind::RescaleQuantized => {
                ni.all_same_elem_kind(&[Int8Q], &[], &[])
            }

            NodeKind::Pow
            | NodeKind::Log
            | NodeKind::Tanh
            | NodeKind::Sigmoid
            | NodeKind::Exp => ni.all_same_elem_kind(&[Float], &[], &[]),

            NodeKind::Modulo => ni.all_same_elem_kind(&[Int32I, Int64I], &[], &[]),

            NodeKind::Convolution => {
                if !ni.in_ty(0).map_or(false, |t| t.is_quantized()) {
                    return ni.all_same_elem_kind(&[Float], &[], &[]);
                }
                ni.all_same_elem_kind(&[Int8Q], &[CONV_BIAS_IN], &[])
                    && matches!(ni.in_elem(CONV_BIAS_IN), Some(Int8Q) | Some(Int32Q))
            }

            NodeKind::FullyConnected => {
                if !ni.in_ty(0).map_or(false, |t| t.is_quantized()) {
                    return ni.all_same_elem_kind(&[Float], &[], &[]);
                }
                ni.all_same_elem_kind(&[Int8Q], &[FC_BIAS_IN], &[])
                    && matches!(ni.in_elem(FC_BIAS_IN), Some(Int8Q) | Some(Int32Q))
            }

            NodeKind::BatchedAdd => {
                if !ni.in_ty(0).map_or(false, |t| t.is_quantized()) {
                    return ni.all_same_elem_kind(&[Float], &[], &[]);
                }
                // The slice operand may be Int8Q or Int32Q.
                ni.all_same_elem_kind(&[Int8Q], &[BATCHED_ADD_SLICE_IN], &[])
                    && matches!(ni.in_elem(BATCHED_ADD_SLICE_IN), Some(Int8Q) | Some(Int32Q))
            }

            NodeKind::Gather => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int64I, Int32I], &[GATHER_INDICES_IN], &[])
                    && is_index(ni.in_elem(GATHER_INDICES_IN))
            }

            NodeKind::ScatterData => {
                ni.all_same_elem_kind(&[Float, Int8Q], &[SCATTER_INDICES_IN], &[])
                    && is_index(ni.in_elem(SCATTER_INDICES_IN))
            }

            NodeKind::Select => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int32I], &[SELECT_COND_IN], &[])
                    && ni.in_elem(SELECT_COND_IN) == Some(Bool)
            }

            NodeKind::Not | NodeKind::And | NodeKind::Or | NodeKind::Xor => {
                ni.all_same_elem_kind(&[Bool], &[], &[])
            }

            NodeKind::Abs
            | NodeKind::Neg
            | NodeKind::Floor
            | NodeKind::Ceil
            | NodeKind::Round
            | NodeKind::Sqrt
            | NodeKind::Rsqrt
            | NodeKind::Reciprocal
            | NodeKind::Sin
            | NodeKind::Cos => ni.all_same_elem_kind(&[Float], &[], &[]),

            NodeKind::CmpEq | NodeKind::CmpNeq | NodeKind::CmpLt | NodeKind::CmpLte => {
                ni.all_same_elem_kind(&[Float, Int8Q, Int32I, Int64I], &[], &[CMP_RESULT_OUT])
                    && ni.out_elem(CMP_RESULT_OUT) == Some(Bool)
            }

            NodeKind::IsNaN => {
                ni.all_same_elem_kind(&[Float], &[], &[CMP_RESULT_OUT])
                    && ni.out_elem(CMP_RESULT_OUT) == Some(Bool)
            }

            NodeKind::TopK => {
                ni.all_same_elem_kind(&[Float, Int8Q], &[], &[TOPK_INDICES_OUT])
                    && is_index(ni.out_elem(TOPK_INDICES_OUT))
            }

            NodeKind::Quantize => {
                ni.in_elem(0) == Some(Float)
                    && matches!(ni.out_elem(0), Some(Int8Q) | Some(Int32Q))
            }

            NodeKind::Dequantize => {
                ni.in_elem(0) == Some(Int8Q) && ni.out_elem(0) == Some(Float)
            }

            NodeKind::SoftMax => {
                ni.all_same_elem_kind(&[Float], &[SOFTMAX_SELECTED_IN], &[])
                    && ni
                        .in_elem(SOFTMAX_SELECTED_IN)
                        .map_or(true, |e| e == Int64I || e == Int32I)
            }

            NodeKind::LengthsSum => {
                ni.all_same_elem_kind(&[Float], &[LENGTHS_SUM_LENGTHS_IN], &[])
                    && ni.in_elem(LENGTHS_SUM_LENGTHS_IN) == Some(Int32I)
            }

            NodeKind::ConvertTo => matches!(
                (ni.in_elem(0), ni.out_elem(0)),
                (Some(Int32I), Some(Float))
                    | (Some(Bool), Some(Float))
                    | (Some(Int64I), Some(Int32I))
                    | (Some(Int32I), Some(Int64I))
            ),

            // Everything else has no CPU kernel.
            _ => false,
        }
    }

    fn should_lower(&self, node: &Node) -> bool {
        // These have hand-tuned kernels; generic lowering would only
        // pessimize them.
        !matches!(
            node.kind,
            NodeKind::Convolution | NodeKind::SparseLengthsSum
        )
    }

    fn compile(
        &self,
        function: &Function,
        _opts: &BackendOptions,
    ) -> Result<Box<dyn CompiledFunction>, BackendError> {
        if let Some(node) = function.nodes.iter().find(|n| !self.is_op_supported(&n.info())) {
            return Err(BackendError::Unsupported {
                backend: Self::NAME,
                function: function.name.clone(),
                node: node.name.clone(),
            });
        }
        let size = function.activation_bytes() as u64;
        Ok(Box::new(SimulatedFunction::new(function, Self::NAME, size)))
    }

    fn can_do_index_type_demotion(
        &self,
        from: ElemKind,
        to: ElemKind,
        precision: &mut PrecisionConfiguration,
    ) -> bool {
        precision.demotion_blacklist.insert(NodeKind::EmbeddingBag);
        precision
            .demotion_blacklist
            .insert(NodeKind::SparseLengthsSum);
        precision
            .demotion_blacklist
            .insert(NodeKind::SparseLengthsWeightedSum);
        from == Int64I && to == Int32I
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{Shape, Type};

    fn ty(elem: ElemKind, dims: Vec<usize>) -> Type {
        Type::new(elem, Shape::new(dims))
    }

    fn qty(elem: ElemKind, dims: Vec<usize>) -> Type {
        Type::quantized(elem, Shape::new(dims), 0.1, 0)
    }

    fn supported(kind: NodeKind, ins: &[Type], outs: &[Type]) -> bool {
        CpuBackend.is_op_supported(&NodeInfo::new(kind, ins, outs))
    }

    #[test]
    fn test_add_mul_kinds() {
        for elem in [Float, Int8Q, Int32I, Int64I] {
            let t = if elem.is_quantized() {
                qty(elem, vec![2])
            } else {
                ty(elem, vec![2])
            };
            assert!(supported(NodeKind::Add, &[t.clone(), t.clone()], &[t.clone()]));
            assert!(supported(NodeKind::Mul, &[t.clone(), t.clone()], &[t]));
        }
        let b = ty(Bool, vec![2]);
        assert!(!supported(NodeKind::Add, &[b.clone(), b.clone()], &[b]));
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let f = ty(Float, vec![2]);
        let i = ty(Int32I, vec![2]);
        assert!(!supported(NodeKind::Add, &[f.clone(), i], &[f]));
    }

    #[test]
    fn test_float_only_unary() {
        let f = ty(Float, vec![4]);
        for kind in [NodeKind::Log, NodeKind::Tanh, NodeKind::Sigmoid, NodeKind::Exp] {
            assert!(supported(kind, &[f.clone()], &[f.clone()]));
        }
        let q = qty(Int8Q, vec![4]);
        assert!(!supported(NodeKind::Log, &[q.clone()], &[q]));
    }

    #[test]
    fn test_convolution_float_path() {
        let f = ty(Float, vec![1, 8, 8, 3]);
        let w = ty(Float, vec![4, 3, 3, 3]);
        let b = ty(Float, vec![4]);
        let out = ty(Float, vec![1, 8, 8, 4]);
        assert!(supported(NodeKind::Convolution, &[f, w, b], &[out]));
    }

    #[test]
    fn test_convolution_quantized_bias() {
        let x = qty(Int8Q, vec![1, 8, 8, 3]);
        let w = qty(Int8Q, vec![4, 3, 3, 3]);
        let out = qty(Int8Q, vec![1, 8, 8, 4]);

        // Bias may be Int8Q or Int32Q.
        for bias_kind in [Int8Q, Int32Q] {
            let b = qty(bias_kind, vec![4]);
            assert!(supported(
                NodeKind::Convolution,
                &[x.clone(), w.clone(), b],
                &[out.clone()]
            ));
        }
        // A float bias is not.
        let b = ty(Float, vec![4]);
        assert!(!supported(NodeKind::Convolution, &[x, w, b], &[out]));
    }

    #[test]
    fn test_quantize_dequantize() {
        let f = ty(Float, vec![4]);
        assert!(supported(NodeKind::Quantize, &[f.clone()], &[qty(Int8Q, vec![4])]));
        assert!(supported(NodeKind::Quantize, &[f.clone()], &[qty(Int32Q, vec![4])]));
        assert!(!supported(NodeKind::Quantize, &[f.clone()], &[ty(Int64I, vec![4])]));

        assert!(supported(NodeKind::Dequantize, &[qty(Int8Q, vec![4])], &[f.clone()]));
        assert!(!supported(NodeKind::Dequantize, &[qty(Int32Q, vec![4])], &[f]));
    }

    #[test]
    fn test_gather_index_slot() {
        let data = ty(Float, vec![8, 4]);
        let out = ty(Float, vec![3, 4]);
        for idx_kind in [Int32I, Int64I] {
            let idx = ty(idx_kind, vec![3]);
            assert!(supported(
                NodeKind::Gather,
                &[data.clone(), idx],
                &[out.clone()]
            ));
        }
        let bad_idx = ty(Float, vec![3]);
        assert!(!supported(NodeKind::Gather, &[data, bad_idx], &[out]));
    }

    #[test]
    fn test_sparse_lengths_sum_slots() {
        let data = ty(Float, vec![16, 4]);
        let indices = ty(Int64I, vec![6]);
        let lengths = ty(Int32I, vec![3]);
        let out = ty(Float, vec![3, 4]);
        assert!(supported(
            NodeKind::SparseLengthsSum,
            &[data.clone(), indices.clone(), lengths.clone()],
            &[out.clone()]
        ));

        // Lengths must be Int32I.
        let bad_lengths = ty(Int64I, vec![3]);
        assert!(!supported(
            NodeKind::SparseLengthsSum,
            &[data, indices, bad_lengths],
            &[out]
        ));
    }

    #[test]
    fn test_cmp_requires_bool_result() {
        let f = ty(Float, vec![4]);
        let b = ty(Bool, vec![4]);
        assert!(supported(NodeKind::CmpLt, &[f.clone(), f.clone()], &[b]));
        assert!(!supported(NodeKind::CmpLt, &[f.clone(), f.clone()], &[f]));
    }

    #[test]
    fn test_select_cond_slot() {
        let c = ty(Bool, vec![4]);
        let f = ty(Float, vec![4]);
        assert!(supported(
            NodeKind::Select,
            &[c, f.clone(), f.clone()],
            &[f.clone()]
        ));
        assert!(!supported(
            NodeKind::Select,
            &[f.clone(), f.clone(), f.clone()],
            &[f]
        ));
    }

    #[test]
    fn test_logical_ops_bool_only() {
        let b = ty(Bool, vec![4]);
        for kind in [NodeKind::Not, NodeKind::And, NodeKind::Or, NodeKind::Xor] {
            assert!(supported(kind, &[b.clone(), b.clone()], &[b.clone()]));
        }
    }

    #[test]
    fn test_modulo_index_only() {
        for elem in [Int32I, Int64I] {
            let t = ty(elem, vec![4]);
            assert!(supported(NodeKind::Modulo, &[t.clone()], &[t]));
        }
        let f = ty(Float, vec![4]);
        assert!(!supported(NodeKind::Modulo, &[f.clone()], &[f]));
    }

    #[test]
    fn test_convert_to_pairs() {
        assert!(supported(
            NodeKind::ConvertTo,
            &[ty(Int32I, vec![2])],
            &[ty(Float, vec![2])]
        ));
        assert!(supported(
            NodeKind::ConvertTo,
            &[ty(Int64I, vec![2])],
            &[ty(Int32I, vec![2])]
        ));
        assert!(!supported(
            NodeKind::ConvertTo,
            &[ty(Float, vec![2])],
            &[ty(Int32I, vec![2])]
        ));
    }

    #[test]
    fn test_unknown_kinds_unsupported() {
        let f = ty(Float, vec![4]);
        for kind in [NodeKind::LayerNorm, NodeKind::Erf, NodeKind::HardSwish] {
            assert!(!supported(kind, &[f.clone()], &[f.clone()]));
        }
    }

    #[test]
    fn test_should_lower_refusals() {
        let node = |kind| graph_ir::Node {
            name: "n".into(),
            kind,
            inputs: vec![],
            input_tys: vec![],
            output_tys: vec![ty(Float, vec![1])],
        };
        assert!(!CpuBackend.should_lower(&node(NodeKind::Convolution)));
        assert!(!CpuBackend.should_lower(&node(NodeKind::SparseLengthsSum)));
        assert!(CpuBackend.should_lower(&node(NodeKind::Add)));
    }

    #[test]
    fn test_index_type_demotion() {
        let mut precision = PrecisionConfiguration::default();
        assert!(CpuBackend.can_do_index_type_demotion(Int64I, Int32I, &mut precision));
        assert!(!CpuBackend.can_do_index_type_demotion(Int32I, Int64I, &mut precision));
        assert!(precision.demotion_blacklist.contains(&NodeKind::EmbeddingBag));
    }

    #[test]
    fn test_num_devices_positive() {
        assert!(CpuBackend::num_devices() >= 1);
    }
}
