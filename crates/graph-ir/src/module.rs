// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Modules, functions, and named storage.
//!
//! A [`Module`] is the unit handed to the host: a set of [`Function`]s plus
//! the named storage they reference. Storage comes in two mutability
//! classes: [`Constant`]s carry baked-in payloads (weights), while
//! [`Placeholder`]s are bound per request. After provisioning, the host
//! strips constant payloads to reclaim memory; the types stay behind so the
//! structure remains inspectable.

use crate::{GraphError, Node};
use std::collections::BTreeMap;
use tensor_core::{Tensor, Type};

/// Whether a named value is baked into the module or bound per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MutabilityKind {
    /// Weight data owned by the module.
    Const,
    /// Request-bound input/output slot.
    Mutable,
}

/// A request-bound input or output slot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Placeholder {
    pub name: String,
    pub ty: Type,
}

/// A named weight tensor.
///
/// The payload is `None` after [`Module::strip`] has run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Constant {
    pub name: String,
    pub ty: Type,
    pub payload: Option<Tensor>,
}

impl Constant {
    /// Creates a constant with a zero-filled payload of the given type.
    pub fn zeroed(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            payload: Some(Tensor::zeroed(ty.clone())),
            ty,
        }
    }
}

/// A named dataflow function: an ordered list of nodes plus its interface.
///
/// `output_nodes[i]` names the node whose value is written to
/// `outputs[i]` when the function runs; it is also the liveness root set
/// for dead-code elimination.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<Placeholder>,
    pub outputs: Vec<Placeholder>,
    pub output_nodes: Vec<String>,
    pub nodes: Vec<Node>,
}

impl Function {
    /// Returns a node by name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Total byte footprint of all node outputs (the activation estimate).
    pub fn activation_bytes(&self) -> usize {
        self.nodes.iter().map(Node::output_bytes).sum()
    }

    /// Checks structural validity: unique node names, resolvable inputs,
    /// and output nodes that exist.
    pub fn verify_structure(&self, module: &Module) -> Result<(), GraphError> {
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(GraphError::DuplicateName(node.name.clone()));
            }
            if node.inputs.len() != node.input_tys.len() {
                return Err(GraphError::Invalid {
                    kind: "node",
                    name: node.name.clone(),
                    detail: format!(
                        "{} inputs but {} input types",
                        node.inputs.len(),
                        node.input_tys.len()
                    ),
                });
            }
            for input in &node.inputs {
                let resolves = seen.contains(input.as_str())
                    || self.inputs.iter().any(|p| &p.name == input)
                    || module.constant(input).is_some();
                if !resolves {
                    return Err(GraphError::UnresolvedValue {
                        node: node.name.clone(),
                        value: input.clone(),
                    });
                }
            }
        }
        for output_node in &self.output_nodes {
            if self.node(output_node).is_none() {
                return Err(GraphError::UnknownName {
                    kind: "output node",
                    name: output_node.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        format!(
            "Function '{}': {} nodes, {} inputs, {} outputs",
            self.name,
            self.nodes.len(),
            self.inputs.len(),
            self.outputs.len(),
        )
    }
}

/// A collection of functions plus the storage they share.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Module {
    functions: Vec<Function>,
    constants: BTreeMap<String, Constant>,
    placeholders: BTreeMap<String, Placeholder>,
}

impl Module {
    /// Creates an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function; fails on a duplicate function name.
    pub fn add_function(&mut self, function: Function) -> Result<(), GraphError> {
        if self.functions.iter().any(|f| f.name == function.name) {
            return Err(GraphError::DuplicateName(function.name));
        }
        self.functions.push(function);
        Ok(())
    }

    /// Removes and returns a function by name.
    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        let idx = self.functions.iter().position(|f| f.name == name)?;
        Some(self.functions.remove(idx))
    }

    /// Returns a function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Returns a function by name, mutably.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// All functions in insertion order.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// All functions, mutably.
    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Adds a constant; fails when the name collides with existing storage.
    pub fn add_constant(&mut self, constant: Constant) -> Result<(), GraphError> {
        if self.storage_kind(&constant.name).is_some() {
            return Err(GraphError::DuplicateName(constant.name));
        }
        self.constants.insert(constant.name.clone(), constant);
        Ok(())
    }

    /// Adds a placeholder; fails when the name collides with existing storage.
    pub fn add_placeholder(&mut self, placeholder: Placeholder) -> Result<(), GraphError> {
        if self.storage_kind(&placeholder.name).is_some() {
            return Err(GraphError::DuplicateName(placeholder.name));
        }
        self.placeholders
            .insert(placeholder.name.clone(), placeholder);
        Ok(())
    }

    /// Removes a constant, returning it.
    pub(crate) fn take_constant(&mut self, name: &str) -> Option<Constant> {
        self.constants.remove(name)
    }

    /// Removes a placeholder.
    pub(crate) fn remove_placeholder(&mut self, name: &str) -> Option<Placeholder> {
        self.placeholders.remove(name)
    }

    /// Returns a constant by name.
    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.get(name)
    }

    /// Returns a placeholder by name.
    pub fn placeholder(&self, name: &str) -> Option<&Placeholder> {
        self.placeholders.get(name)
    }

    /// All constants.
    pub fn constants(&self) -> impl Iterator<Item = &Constant> {
        self.constants.values()
    }

    /// Classifies a storage name, or `None` when it is not storage.
    pub fn storage_kind(&self, name: &str) -> Option<MutabilityKind> {
        if self.constants.contains_key(name) {
            Some(MutabilityKind::Const)
        } else if self.placeholders.contains_key(name) {
            Some(MutabilityKind::Mutable)
        } else {
            None
        }
    }

    /// Total bytes of live constant payloads.
    pub fn constant_bytes(&self) -> usize {
        self.constants
            .values()
            .filter_map(|c| c.payload.as_ref())
            .map(Tensor::size_bytes)
            .sum()
    }

    /// Drops all constant payloads, keeping their types.
    ///
    /// Called after provisioning: the devices hold compiled copies and the
    /// host no longer needs the raw weights.
    pub fn strip(&mut self) {
        for constant in self.constants.values_mut() {
            constant.payload = None;
        }
    }
}
