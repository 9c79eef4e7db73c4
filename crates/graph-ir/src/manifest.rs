// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON network manifest parsing.
//!
//! A manifest describes a module as data: constants with their types, and
//! functions as node lists. It is the on-disk form the CLI feeds to the
//! host.
//!
//! # Format
//! ```json
//! {
//!   "name": "demo",
//!   "constants": [
//!     { "name": "w1", "elem": "float", "dims": [4, 8] }
//!   ],
//!   "functions": [
//!     {
//!       "name": "main",
//!       "inputs":  [ { "name": "in",  "elem": "float", "dims": [1, 4] } ],
//!       "outputs": [ { "name": "out", "elem": "float", "dims": [1, 8], "node": "fc" } ],
//!       "nodes": [
//!         { "name": "fc", "kind": "fully_connected",
//!           "inputs": ["in", "w1"],
//!           "outs": [ { "elem": "float", "dims": [1, 8] } ] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Node inputs resolve, in order, against earlier nodes (their first
//! output), function inputs, and module constants.

use crate::{Constant, Function, GraphError, Module, Node, NodeKind, Placeholder};
use std::collections::BTreeMap;
use std::path::Path;
use tensor_core::{ElemKind, Shape, Type};

/// A tensor type as written in a manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TypeSpec {
    pub elem: ElemKind,
    pub dims: Vec<usize>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub offset: Option<i32>,
}

impl TypeSpec {
    fn to_type(&self) -> Type {
        match (self.scale, self.offset) {
            (Some(scale), offset) => Type::quantized(
                self.elem,
                Shape::new(self.dims.clone()),
                scale,
                offset.unwrap_or(0),
            ),
            _ => Type::new(self.elem, Shape::new(self.dims.clone())),
        }
    }
}

/// A named value declaration (constant, input, or output).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValueSpec {
    pub name: String,
    #[serde(flatten)]
    pub ty: TypeSpec,
    /// For outputs: the node whose value fills this slot.
    #[serde(default)]
    pub node: Option<String>,
}

/// A node entry in a manifest function.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    pub inputs: Vec<String>,
    pub outs: Vec<TypeSpec>,
}

/// A function entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<ValueSpec>,
    #[serde(default)]
    pub outputs: Vec<ValueSpec>,
    pub nodes: Vec<NodeSpec>,
}

/// Top-level network manifest, deserialized from JSON.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NetworkManifest {
    /// Human-readable module name.
    pub name: String,
    #[serde(default)]
    pub constants: Vec<ValueSpec>,
    pub functions: Vec<FunctionSpec>,
}

impl NetworkManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }

    /// Builds a [`Module`] from the manifest.
    ///
    /// Performs full structural validation: unique names, resolvable node
    /// inputs, and declared output nodes that exist.
    pub fn to_module(&self) -> Result<Module, GraphError> {
        let mut module = Module::new();

        for constant in &self.constants {
            module.add_constant(Constant::zeroed(
                constant.name.clone(),
                constant.ty.to_type(),
            ))?;
        }

        for spec in &self.functions {
            // Types visible to node inputs, in resolution order.
            let mut known: BTreeMap<String, Type> = BTreeMap::new();
            for constant in &self.constants {
                known.insert(constant.name.clone(), constant.ty.to_type());
            }
            for input in &spec.inputs {
                known.insert(input.name.clone(), input.ty.to_type());
            }

            let mut nodes = Vec::with_capacity(spec.nodes.len());
            for node_spec in &spec.nodes {
                let mut input_tys = Vec::with_capacity(node_spec.inputs.len());
                for input in &node_spec.inputs {
                    let ty = known.get(input).ok_or_else(|| GraphError::UnresolvedValue {
                        node: node_spec.name.clone(),
                        value: input.clone(),
                    })?;
                    input_tys.push(ty.clone());
                }
                let output_tys: Vec<Type> =
                    node_spec.outs.iter().map(TypeSpec::to_type).collect();
                if output_tys.is_empty() {
                    return Err(GraphError::Invalid {
                        kind: "node",
                        name: node_spec.name.clone(),
                        detail: "no output types".into(),
                    });
                }
                known.insert(node_spec.name.clone(), output_tys[0].clone());
                nodes.push(Node {
                    name: node_spec.name.clone(),
                    kind: node_spec.kind,
                    inputs: node_spec.inputs.clone(),
                    input_tys,
                    output_tys,
                });
            }

            let mut output_nodes = Vec::with_capacity(spec.outputs.len());
            for output in &spec.outputs {
                let node = output.node.clone().ok_or_else(|| GraphError::Invalid {
                    kind: "output",
                    name: output.name.clone(),
                    detail: "missing 'node' reference".into(),
                })?;
                output_nodes.push(node);
            }

            let function = Function {
                name: spec.name.clone(),
                inputs: spec
                    .inputs
                    .iter()
                    .map(|v| Placeholder {
                        name: v.name.clone(),
                        ty: v.ty.to_type(),
                    })
                    .collect(),
                outputs: spec
                    .outputs
                    .iter()
                    .map(|v| Placeholder {
                        name: v.name.clone(),
                        ty: v.ty.to_type(),
                    })
                    .collect(),
                output_nodes,
                nodes,
            };
            function.verify_structure(&module)?;

            // Register the interface placeholders at module scope (shared
            // names across functions must agree implicitly; first wins).
            for ph in function.inputs.iter().chain(function.outputs.iter()) {
                if module.storage_kind(&ph.name).is_none() {
                    module.add_placeholder(ph.clone())?;
                }
            }
            module.add_function(function)?;
        }

        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest_json() -> &'static str {
        r#"{
            "name": "demo",
            "constants": [
                { "name": "w1", "elem": "float", "dims": [4, 8] },
                { "name": "b1", "elem": "float", "dims": [8] }
            ],
            "functions": [
                {
                    "name": "main",
                    "inputs":  [ { "name": "in", "elem": "float", "dims": [1, 4] } ],
                    "outputs": [ { "name": "out", "elem": "float", "dims": [1, 8], "node": "act" } ],
                    "nodes": [
                        { "name": "fc", "kind": "fully_connected",
                          "inputs": ["in", "w1", "b1"],
                          "outs": [ { "elem": "float", "dims": [1, 8] } ] },
                        { "name": "act", "kind": "tanh",
                          "inputs": ["fc"],
                          "outs": [ { "elem": "float", "dims": [1, 8] } ] }
                    ]
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_manifest() {
        let m = NetworkManifest::from_json(sample_manifest_json()).unwrap();
        assert_eq!(m.name, "demo");
        assert_eq!(m.constants.len(), 2);
        assert_eq!(m.functions.len(), 1);
        assert_eq!(m.functions[0].nodes.len(), 2);
    }

    #[test]
    fn test_to_module() {
        let m = NetworkManifest::from_json(sample_manifest_json()).unwrap();
        let module = m.to_module().unwrap();

        let f = module.function("main").unwrap();
        assert_eq!(f.nodes.len(), 2);
        assert_eq!(f.output_nodes, vec!["act".to_string()]);
        assert!(module.constant("w1").is_some());
        // Node input types were resolved from the declarations.
        assert_eq!(f.node("act").unwrap().input_tys[0].shape.dims(), &[1, 8]);
    }

    #[test]
    fn test_unresolved_input() {
        let json = r#"{
            "name": "bad",
            "functions": [{
                "name": "main",
                "outputs": [ { "name": "out", "elem": "float", "dims": [1], "node": "n" } ],
                "nodes": [
                    { "name": "n", "kind": "neg", "inputs": ["missing"],
                      "outs": [ { "elem": "float", "dims": [1] } ] }
                ]
            }]
        }"#;
        let m = NetworkManifest::from_json(json).unwrap();
        assert!(matches!(
            m.to_module(),
            Err(GraphError::UnresolvedValue { .. })
        ));
    }

    #[test]
    fn test_output_without_node() {
        let json = r#"{
            "name": "bad",
            "functions": [{
                "name": "main",
                "inputs": [ { "name": "in", "elem": "float", "dims": [1] } ],
                "outputs": [ { "name": "out", "elem": "float", "dims": [1] } ],
                "nodes": [
                    { "name": "n", "kind": "neg", "inputs": ["in"],
                      "outs": [ { "elem": "float", "dims": [1] } ] }
                ]
            }]
        }"#;
        let m = NetworkManifest::from_json(json).unwrap();
        assert!(m.to_module().is_err());
    }

    #[test]
    fn test_quantized_type_spec() {
        let spec = TypeSpec {
            elem: ElemKind::Int8Q,
            dims: vec![4],
            scale: Some(0.1),
            offset: Some(-2),
        };
        let ty = spec.to_type();
        assert!(ty.is_quantized());
        assert_eq!(ty.offset, -2);
    }

    #[test]
    fn test_malformed_json() {
        assert!(NetworkManifest::from_json("{ not json").is_err());
    }
}
