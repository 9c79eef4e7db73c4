// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # partitioner
//!
//! Splits each function of a module into device-sized, backend-compatible
//! partitions and links them into a [`Dag`] per function.
//!
//! The algorithm is a pure function of the module and the device inventory:
//!
//! 1. Pick a backend for every node: the sticky choice (previous node's
//!    backend) when it still qualifies, else the first device backend whose
//!    hints and `is_op_supported` table admit the node.
//! 2. Group consecutive same-backend nodes greedily, splitting when the
//!    estimated resident size (weights + `context_count` copies of the
//!    activations) would exceed the largest available device budget for
//!    that backend.
//! 3. Rewrite multi-partition functions into `<name>_part<i>` sub-functions
//!    whose interfaces carry cross-partition values by producing-node name.
//!
//! `context_count` is the number of in-flight requests each partition must
//! hold buffers for; modes with per-request device state (P2P, DRT) pass
//! the host's full concurrency here.

mod dag;
mod error;

pub use dag::{Dag, DagNode};
pub use error::PartitionError;

use backend_core::{create_backend, Backend};
use device_manager::DeviceInfo;
use graph_ir::{Function, Module, Node, Placeholder};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tensor_core::Type;

/// Partitions modules against a fixed device inventory.
pub struct Partitioner {
    device_info: Vec<DeviceInfo>,
    context_count: usize,
}

struct Segment {
    backend: String,
    node_indices: Vec<usize>,
    constants: BTreeSet<String>,
    weight_bytes: u64,
    activation_bytes: u64,
}

impl Segment {
    fn new(backend: String) -> Self {
        Self {
            backend,
            node_indices: Vec::new(),
            constants: BTreeSet::new(),
            weight_bytes: 0,
            activation_bytes: 0,
        }
    }

    fn estimated_bytes(&self, context_count: usize) -> u64 {
        self.weight_bytes + context_count as u64 * self.activation_bytes
    }
}

impl Partitioner {
    /// Creates a partitioner over the given device snapshot.
    pub fn new(device_info: Vec<DeviceInfo>, context_count: usize) -> Self {
        Self {
            device_info,
            context_count: context_count.max(1),
        }
    }

    /// Partitions every function in `module`, replacing multi-partition
    /// functions with their sub-functions. Returns one [`Dag`] per
    /// original function.
    pub fn partition(&self, module: &mut Module) -> Result<Vec<Dag>, PartitionError> {
        if self.device_info.is_empty() {
            return Err(PartitionError::NoDevices);
        }

        // Backend handles, in device order, deduplicated.
        let mut backend_order: Vec<String> = Vec::new();
        for info in &self.device_info {
            if !backend_order.contains(&info.backend_name) {
                backend_order.push(info.backend_name.clone());
            }
        }
        let mut backends: BTreeMap<String, Arc<dyn Backend>> = BTreeMap::new();
        for name in &backend_order {
            backends.insert(name.clone(), create_backend(name)?);
        }

        let function_names: Vec<String> = module
            .functions()
            .iter()
            .map(|f| f.name.clone())
            .collect();

        let mut dags = Vec::with_capacity(function_names.len());
        for name in function_names {
            let function = module
                .function(&name)
                .cloned()
                .expect("function disappeared during partitioning");
            let dag = self.partition_function(&function, module, &backend_order, &backends)?;
            tracing::info!("{}", dag.summary());
            dags.push(dag);
        }
        Ok(dags)
    }

    fn partition_function(
        &self,
        function: &Function,
        module: &mut Module,
        backend_order: &[String],
        backends: &BTreeMap<String, Arc<dyn Backend>>,
    ) -> Result<Dag, PartitionError> {
        let interface_inputs: Vec<String> =
            function.inputs.iter().map(|p| p.name.clone()).collect();
        let interface_outputs: Vec<String> =
            function.outputs.iter().map(|p| p.name.clone()).collect();

        // Trivial functions stay whole on the first backend.
        if function.nodes.is_empty() {
            let node = DagNode {
                name: function.name.clone(),
                backend_name: backend_order[0].clone(),
                size: 0,
                inputs: interface_inputs,
                outputs: interface_outputs,
                parents: vec![],
                children: vec![],
                device_runtime_infos: vec![],
                logical_devices: 1,
            };
            return Dag::new(function.name.clone(), vec![0], vec![node]);
        }

        let segments = self.build_segments(function, module, backend_order, backends)?;

        if segments.len() == 1 {
            let size = segments[0].estimated_bytes(self.context_count);
            let node = DagNode {
                name: function.name.clone(),
                backend_name: segments[0].backend.clone(),
                size,
                inputs: interface_inputs,
                outputs: interface_outputs,
                parents: vec![],
                children: vec![],
                device_runtime_infos: vec![],
                logical_devices: 1,
            };
            return Dag::new(function.name.clone(), vec![0], vec![node]);
        }

        self.split_into_parts(function, module, segments)
    }

    fn build_segments(
        &self,
        function: &Function,
        module: &Module,
        backend_order: &[String],
        backends: &BTreeMap<String, Arc<dyn Backend>>,
    ) -> Result<Vec<Segment>, PartitionError> {
        let mut segments: Vec<Segment> = Vec::new();

        for (idx, node) in function.nodes.iter().enumerate() {
            let sticky = segments.last().map(|s| s.backend.clone());
            let backend = self
                .choose_backend(node, sticky.as_deref(), backend_order, backends)
                .ok_or_else(|| PartitionError::UnsupportedNode {
                    function: function.name.clone(),
                    node: node.name.clone(),
                    kind: node.kind.as_str().to_string(),
                })?;

            let weight_bytes: u64 = node
                .inputs
                .iter()
                .filter_map(|input| module.constant(input))
                .map(|c| c.ty.size_bytes() as u64)
                .sum();
            let activation_bytes = node.output_bytes() as u64;

            let budget = self.backend_budget(&backend);
            let needs_new = match segments.last() {
                Some(segment) if segment.backend == backend => {
                    let mut projected = segment.estimated_bytes(self.context_count);
                    projected += weight_bytes
                        + self.context_count as u64 * activation_bytes;
                    projected > budget
                }
                _ => true,
            };

            if needs_new {
                let single = weight_bytes + self.context_count as u64 * activation_bytes;
                if single > budget {
                    return Err(PartitionError::OutOfMemory {
                        function: function.name.clone(),
                        backend,
                        needed: single,
                        available: budget,
                    });
                }
                segments.push(Segment::new(backend));
            }

            let segment = segments.last_mut().expect("segment just ensured");
            segment.node_indices.push(idx);
            segment.activation_bytes += activation_bytes;
            for input in &node.inputs {
                if module.constant(input).is_some() && segment.constants.insert(input.clone()) {
                    segment.weight_bytes += module
                        .constant(input)
                        .map(|c| c.ty.size_bytes() as u64)
                        .unwrap_or(0);
                }
            }
        }

        Ok(segments)
    }

    fn choose_backend(
        &self,
        node: &Node,
        sticky: Option<&str>,
        backend_order: &[String],
        backends: &BTreeMap<String, Arc<dyn Backend>>,
    ) -> Option<String> {
        let admits = |backend_name: &str| -> bool {
            let hinted = self.device_info.iter().any(|info| {
                info.backend_name == backend_name && self.device_admits(info, node)
            });
            if !hinted {
                return false;
            }
            backends
                .get(backend_name)
                .map(|b| b.is_op_supported(&node.info()))
                .unwrap_or(false)
        };

        if let Some(backend) = sticky {
            if admits(backend) {
                return Some(backend.to_string());
            }
        }
        backend_order
            .iter()
            .find(|name| admits(name.as_str()))
            .cloned()
    }

    fn device_admits(&self, info: &DeviceInfo, node: &Node) -> bool {
        let label = node.kind.as_str();
        if info.non_supported_nodes.iter().any(|n| n == label) {
            return false;
        }
        if !info.supported_nodes.is_empty()
            && !info.supported_nodes.iter().any(|n| n == label)
        {
            return false;
        }
        true
    }

    /// Largest available memory among devices of `backend`.
    fn backend_budget(&self, backend: &str) -> u64 {
        self.device_info
            .iter()
            .filter(|info| info.backend_name == backend)
            .map(|info| info.available_memory)
            .max()
            .unwrap_or(0)
    }

    /// Rewrites `function` into one sub-function per segment and assembles
    /// the chain DAG. Cross-partition values travel under their producing
    /// node's name.
    fn split_into_parts(
        &self,
        function: &Function,
        module: &mut Module,
        segments: Vec<Segment>,
    ) -> Result<Dag, PartitionError> {
        // Types every value is known by inside this function.
        let mut known_types: BTreeMap<String, Type> = BTreeMap::new();
        for input in &function.inputs {
            known_types.insert(input.name.clone(), input.ty.clone());
        }
        for node in &function.nodes {
            if let Some(ty) = node.output_tys.first() {
                known_types.insert(node.name.clone(), ty.clone());
            }
        }

        // Which segment produces each node.
        let mut producer_segment: BTreeMap<&str, usize> = BTreeMap::new();
        for (seg_idx, segment) in segments.iter().enumerate() {
            for &node_idx in &segment.node_indices {
                producer_segment.insert(function.nodes[node_idx].name.as_str(), seg_idx);
            }
        }

        let mut dag_nodes = Vec::with_capacity(segments.len());
        let mut part_functions = Vec::with_capacity(segments.len());

        for (seg_idx, segment) in segments.iter().enumerate() {
            let part_name = format!("{}_part{}", function.name, seg_idx);
            let produced: BTreeSet<&str> = segment
                .node_indices
                .iter()
                .map(|&i| function.nodes[i].name.as_str())
                .collect();

            // Inputs: values read from outside this segment, minus constants.
            let mut inputs: Vec<Placeholder> = Vec::new();
            let mut seen_inputs = BTreeSet::new();
            for &node_idx in &segment.node_indices {
                for input in &function.nodes[node_idx].inputs {
                    if produced.contains(input.as_str())
                        || module.constant(input).is_some()
                        || !seen_inputs.insert(input.clone())
                    {
                        continue;
                    }
                    let ty = known_types.get(input).cloned().ok_or_else(|| {
                        PartitionError::InvalidDag {
                            function: function.name.clone(),
                            detail: format!("untyped cross-partition value '{input}'"),
                        }
                    })?;
                    inputs.push(Placeholder {
                        name: input.clone(),
                        ty,
                    });
                }
            }

            // Outputs: values consumed by later segments, plus the original
            // function outputs produced here.
            let mut outputs: Vec<Placeholder> = Vec::new();
            let mut output_nodes: Vec<String> = Vec::new();
            for &node_idx in &segment.node_indices {
                let node_name = function.nodes[node_idx].name.as_str();
                let consumed_later = function.nodes.iter().any(|n| {
                    n.inputs.iter().any(|i| i == node_name)
                        && producer_segment
                            .get(n.name.as_str())
                            .map_or(false, |&s| s > seg_idx)
                });
                if consumed_later {
                    outputs.push(Placeholder {
                        name: node_name.to_string(),
                        ty: known_types[node_name].clone(),
                    });
                    output_nodes.push(node_name.to_string());
                }
            }
            for (output, output_node) in function.outputs.iter().zip(&function.output_nodes) {
                if produced.contains(output_node.as_str()) {
                    outputs.push(output.clone());
                    output_nodes.push(output_node.clone());
                }
            }

            let nodes: Vec<Node> = segment
                .node_indices
                .iter()
                .map(|&i| function.nodes[i].clone())
                .collect();

            let dag_inputs: Vec<String> = inputs.iter().map(|p| p.name.clone()).collect();
            let dag_outputs: Vec<String> = outputs.iter().map(|p| p.name.clone()).collect();
            part_functions.push(Function {
                name: part_name.clone(),
                inputs,
                outputs,
                output_nodes,
                nodes,
            });

            let prev: Vec<usize> = if seg_idx == 0 { vec![] } else { vec![seg_idx - 1] };
            let next: Vec<usize> = if seg_idx + 1 == segments.len() {
                vec![]
            } else {
                vec![seg_idx + 1]
            };
            dag_nodes.push(DagNode {
                name: part_name,
                backend_name: segment.backend.clone(),
                size: segment.estimated_bytes(self.context_count),
                inputs: dag_inputs,
                outputs: dag_outputs,
                parents: prev,
                children: next,
                device_runtime_infos: vec![],
                logical_devices: 1,
            });
        }

        module.remove_function(&function.name);
        for part in part_functions {
            module
                .add_function(part)
                .map_err(|e| PartitionError::InvalidDag {
                    function: function.name.clone(),
                    detail: e.to_string(),
                })?;
        }

        tracing::debug!(
            "function '{}' split into {} partition(s)",
            function.name,
            dag_nodes.len(),
        );
        Dag::new(function.name.clone(), vec![0], dag_nodes)
    }
}
