// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The partitioned form of a network.
//!
//! A [`Dag`] is an arena of [`DagNode`]s rooted at a synthetic entry. Each
//! node is one sub-function targeted at a backend; edges are execution
//! dependencies. The executor walks this structure, and the provisioner
//! records on each node which devices the sub-function was loaded onto.

use device_manager::DeviceId;

/// One partition: a sub-function bound to a backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DagNode {
    /// Name of the sub-function in the module.
    pub name: String,
    /// Backend that will compile and run this partition.
    pub backend_name: String,
    /// Estimated resident bytes (weights + per-context activations).
    pub size: u64,
    /// Names of the values this partition reads from the request bindings.
    pub inputs: Vec<String>,
    /// Names of the values this partition writes back.
    pub outputs: Vec<String>,
    /// Indices of nodes that must complete before this one runs.
    pub parents: Vec<usize>,
    /// Indices of nodes unblocked by this one.
    pub children: Vec<usize>,
    /// Devices this partition is loaded onto (filled by the provisioner).
    pub device_runtime_infos: Vec<DeviceId>,
    /// How many devices this partition should be replicated across.
    pub logical_devices: usize,
}

/// A partitioned network: the entry plus its partitions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Dag {
    root_name: String,
    entry_children: Vec<usize>,
    nodes: Vec<DagNode>,
}

impl Dag {
    /// Assembles a DAG; validates the edge structure.
    pub fn new(
        root_name: impl Into<String>,
        entry_children: Vec<usize>,
        nodes: Vec<DagNode>,
    ) -> Result<Self, crate::PartitionError> {
        let dag = Self {
            root_name: root_name.into(),
            entry_children,
            nodes,
        };
        dag.validate()?;
        Ok(dag)
    }

    /// The network name this DAG implements (the original function name).
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Indices of the nodes with no parents.
    pub fn entry_children(&self) -> &[usize] {
        &self.entry_children
    }

    /// All partitions.
    pub fn nodes(&self) -> &[DagNode] {
        &self.nodes
    }

    /// All partitions, mutably (for the provisioner).
    pub fn nodes_mut(&mut self) -> &mut [DagNode] {
        &mut self.nodes
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the DAG has no partitions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Checks index bounds, edge symmetry, and forward-only edges (which
    /// rules out cycles in the arena ordering).
    pub fn validate(&self) -> Result<(), crate::PartitionError> {
        let fail = |detail: String| crate::PartitionError::InvalidDag {
            function: self.root_name.clone(),
            detail,
        };
        if self.nodes.is_empty() {
            return Err(fail("no partitions".into()));
        }
        if self.entry_children.is_empty() {
            return Err(fail("no entry children".into()));
        }
        for &child in &self.entry_children {
            if child >= self.nodes.len() {
                return Err(fail(format!("entry child {child} out of range")));
            }
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                if child >= self.nodes.len() {
                    return Err(fail(format!("child {child} of {idx} out of range")));
                }
                if child <= idx {
                    return Err(fail(format!("edge {idx} -> {child} is not forward")));
                }
                if !self.nodes[child].parents.contains(&idx) {
                    return Err(fail(format!("edge {idx} -> {child} lacks back edge")));
                }
            }
            for &parent in &node.parents {
                if parent >= self.nodes.len() || !self.nodes[parent].children.contains(&idx) {
                    return Err(fail(format!("parent {parent} of {idx} inconsistent")));
                }
            }
        }
        Ok(())
    }

    /// Returns a summary string for logs and `inspect` output.
    pub fn summary(&self) -> String {
        let total: u64 = self.nodes.iter().map(|n| n.size).sum();
        format!(
            "DAG '{}': {} partition(s), {} byte(s) estimated",
            self.root_name,
            self.nodes.len(),
            total,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, parents: Vec<usize>, children: Vec<usize>) -> DagNode {
        DagNode {
            name: name.into(),
            backend_name: "cpu".into(),
            size: 100,
            inputs: vec![],
            outputs: vec![],
            parents,
            children,
            device_runtime_infos: vec![],
            logical_devices: 1,
        }
    }

    #[test]
    fn test_chain_valid() {
        let dag = Dag::new(
            "net",
            vec![0],
            vec![node("a", vec![], vec![1]), node("b", vec![0], vec![])],
        )
        .unwrap();
        assert_eq!(dag.len(), 2);
        assert_eq!(dag.root_name(), "net");
        assert_eq!(dag.entry_children(), &[0]);
    }

    #[test]
    fn test_backward_edge_rejected() {
        let result = Dag::new(
            "net",
            vec![0],
            vec![node("a", vec![1], vec![]), node("b", vec![], vec![0])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_back_edge_rejected() {
        let result = Dag::new(
            "net",
            vec![0],
            vec![node("a", vec![], vec![1]), node("b", vec![], vec![])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(Dag::new("net", vec![], vec![]).is_err());
    }

    #[test]
    fn test_summary() {
        let dag = Dag::new("net", vec![0], vec![node("a", vec![], vec![])]).unwrap();
        let s = dag.summary();
        assert!(s.contains("net"));
        assert!(s.contains("1 partition"));
    }
}
