// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Artifacts the host writes to disk: the optional compiled-DAG dump and
//! the on-error function graphs.
//!
//! The DAG artifact keeps the `<root>.onnx` name of the model-exchange
//! flow but carries the partitioned structure plus the recorded
//! constant-folding subgraph names as JSON; raw constant data is never
//! included.

use crate::HostError;
use graph_ir::{ConstantFoldingRecord, Function};
use partitioner::Dag;
use std::path::PathBuf;

#[derive(serde::Serialize)]
struct FoldEntry<'a> {
    constant: &'a str,
    recorded_function: &'a str,
}

#[derive(serde::Serialize)]
struct DagArtifact<'a> {
    root: &'a str,
    nodes: &'a [partitioner::DagNode],
    constant_folding: Vec<FoldEntry<'a>>,
}

/// Writes `<root>.onnx` next to the process; returns the path.
pub fn write_dag_artifact(
    dag: &Dag,
    record: &ConstantFoldingRecord,
) -> Result<PathBuf, HostError> {
    let artifact = DagArtifact {
        root: dag.root_name(),
        nodes: dag.nodes(),
        constant_folding: record
            .entries()
            .map(|(constant, recorded_function)| FoldEntry {
                constant,
                recorded_function,
            })
            .collect(),
    };
    let path = PathBuf::from(format!("{}.onnx", dag.root_name()));
    std::fs::write(&path, serde_json::to_string_pretty(&artifact)?)?;
    Ok(path)
}

/// Dumps one function as a DOT graph to a uniquely named debug file.
pub(crate) fn dump_function_dot(function: &Function) -> Result<PathBuf, HostError> {
    let mut dot = String::new();
    dot.push_str(&format!("digraph \"{}\" {{\n", function.name));
    for node in &function.nodes {
        dot.push_str(&format!(
            "  \"{}\" [label=\"{}\\n{}\"];\n",
            node.name, node.name, node.kind
        ));
        for input in &node.inputs {
            dot.push_str(&format!("  \"{}\" -> \"{}\";\n", input, node.name));
        }
    }
    dot.push_str("}\n");

    let path = PathBuf::from(format!("final_graph_dbg_err_{}.dot", function.name));
    std::fs::write(&path, dot)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use partitioner::DagNode;

    fn dag() -> Dag {
        Dag::new(
            "artifact_test_net",
            vec![0],
            vec![DagNode {
                name: "artifact_test_net".into(),
                backend_name: "cpu".into(),
                size: 42,
                inputs: vec!["in".into()],
                outputs: vec!["out".into()],
                parents: vec![],
                children: vec![],
                device_runtime_infos: vec![0],
                logical_devices: 1,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_write_dag_artifact() {
        let path = write_dag_artifact(&dag(), &ConstantFoldingRecord::default()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(path.file_name().unwrap(), "artifact_test_net.onnx");
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["root"], "artifact_test_net");
        assert_eq!(value["nodes"][0]["backend_name"], "cpu");
        // No constant payloads in the artifact.
        assert!(value["constant_folding"].as_array().unwrap().is_empty());
    }
}
