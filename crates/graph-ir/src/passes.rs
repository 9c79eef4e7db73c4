// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Target-independent graph transformations.
//!
//! These are the passes the host pipeline runs around partitioning:
//!
//! 1. [`optimize_function`] before partitioning, so the partitioner sees a
//!    cleaned-up graph.
//! 2. [`ConstantModificationPreventer`] around the whole pipeline when the
//!    compilation context asks for delayed constant modification.
//! 3. [`constant_fold_and_record`] + [`run_dce`] after partitioning, with a
//!    [`ConstantFoldingRecord`] kept so the folded subgraphs can be embedded
//!    in a serialized artifact before [`cleanup_constant_folding`] removes
//!    the scaffolding.

use crate::{Constant, Function, GraphError, Module, NodeKind, Placeholder};
use std::collections::{BTreeMap, HashSet};

/// Removes nodes that no output depends on.
///
/// Liveness roots are the function's `output_nodes`; anything not reachable
/// from them through input references is dropped.
pub fn run_dce(function: &mut Function) {
    let mut live: HashSet<String> = function.output_nodes.iter().cloned().collect();
    // Nodes are topologically ordered, so one reverse sweep settles liveness.
    for node in function.nodes.iter().rev() {
        if live.contains(&node.name) {
            for input in &node.inputs {
                live.insert(input.clone());
            }
        }
    }
    let before = function.nodes.len();
    function.nodes.retain(|n| live.contains(&n.name));
    let removed = before - function.nodes.len();
    if removed > 0 {
        tracing::debug!(
            "dce removed {removed} dead node(s) from '{}'",
            function.name
        );
    }
}

/// Target-independent cleanup run before partitioning.
///
/// Collapses reshape-of-reshape chains, then eliminates dead nodes. The
/// heavy lifting (lowering, fusion) belongs to the backends.
pub fn optimize_function(function: &mut Function) -> Result<(), GraphError> {
    // Reshape(Reshape(x)) == Reshape(x): rewire the outer node to x.
    let producers: BTreeMap<String, (NodeKind, Vec<String>)> = function
        .nodes
        .iter()
        .map(|n| (n.name.clone(), (n.kind, n.inputs.clone())))
        .collect();

    for node in &mut function.nodes {
        if node.kind != NodeKind::Reshape {
            continue;
        }
        let Some(input) = node.inputs.first().cloned() else {
            return Err(GraphError::Invalid {
                kind: "node",
                name: node.name.clone(),
                detail: "reshape with no input".into(),
            });
        };
        if let Some((NodeKind::Reshape, inner_inputs)) = producers.get(&input) {
            if let Some(origin) = inner_inputs.first() {
                node.inputs[0] = origin.clone();
            }
        }
    }

    run_dce(function);
    Ok(())
}

/// Names of the scaffolding created while folding constants: folded-constant
/// name to the recorded single-node function that computed it.
#[derive(Debug, Clone, Default)]
pub struct ConstantFoldingRecord {
    entries: BTreeMap<String, String>,
}

impl ConstantFoldingRecord {
    /// Returns `true` when nothing was folded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(constant, recorded function)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merges another record into this one.
    pub fn merge(&mut self, other: ConstantFoldingRecord) {
        self.entries.extend(other.entries);
    }
}

/// Folds nodes of the named function whose inputs are all constants,
/// recording each folded subgraph as a one-node function in the module.
///
/// Consumers of a folded node are rewired to a fresh constant; the dead
/// producer is left for [`run_dce`]. Output nodes are never folded (their
/// values must be produced at run time).
pub fn constant_fold_and_record(
    module: &mut Module,
    function_name: &str,
) -> Result<ConstantFoldingRecord, GraphError> {
    let mut function = module
        .remove_function(function_name)
        .ok_or(GraphError::UnknownName {
            kind: "function",
            name: function_name.to_string(),
        })?;
    let result = fold_into_module(&mut function, module);
    // The function goes back whether or not folding succeeded.
    module.add_function(function)?;
    result
}

fn fold_into_module(
    function: &mut Function,
    module: &mut Module,
) -> Result<ConstantFoldingRecord, GraphError> {
    let mut record = ConstantFoldingRecord::default();
    let mut rewires: BTreeMap<String, String> = BTreeMap::new();

    let output_nodes: HashSet<&String> = function.output_nodes.iter().collect();
    for node in &function.nodes {
        if output_nodes.contains(&node.name) || node.output_tys.len() != 1 {
            continue;
        }
        let all_const = !node.inputs.is_empty()
            && node
                .inputs
                .iter()
                .all(|input| module.constant(input).is_some());
        if !all_const {
            continue;
        }

        let folded_name = format!("{}__folded", node.name);
        module.add_constant(Constant::zeroed(
            folded_name.clone(),
            node.output_tys[0].clone(),
        ))?;

        let recorded_name = format!("{}_constfold_{}", function.name, node.name);
        module.add_function(Function {
            name: recorded_name.clone(),
            inputs: vec![],
            outputs: vec![],
            output_nodes: vec![node.name.clone()],
            nodes: vec![node.clone()],
        })?;

        record.entries.insert(folded_name.clone(), recorded_name);
        rewires.insert(node.name.clone(), folded_name);
    }

    if !rewires.is_empty() {
        for node in &mut function.nodes {
            for input in &mut node.inputs {
                if let Some(folded) = rewires.get(input) {
                    *input = folded.clone();
                }
            }
        }
        tracing::debug!(
            "constant folding replaced {} node(s) in '{}'",
            rewires.len(),
            function.name
        );
    }

    Ok(record)
}

/// Removes the recorded one-node functions created by
/// [`constant_fold_and_record`]. The folded constants stay: they are real
/// weights now.
pub fn cleanup_constant_folding(module: &mut Module, record: &ConstantFoldingRecord) {
    for (_, recorded) in record.entries() {
        module.remove_function(recorded);
    }
}

/// Swaps every constant for a temporary placeholder of the same name and
/// type, so that no pass can touch weight payloads until the preventer is
/// deactivated.
#[derive(Debug, Default)]
pub struct ConstantModificationPreventer {
    stash: Vec<Constant>,
    active: bool,
}

impl ConstantModificationPreventer {
    /// Creates an inactive preventer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while constants are stashed away.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stashes all constants, leaving placeholders in their place.
    pub fn activate(&mut self, module: &mut Module) -> Result<(), GraphError> {
        debug_assert!(!self.active, "preventer activated twice");
        let names: Vec<String> = module.constants().map(|c| c.name.clone()).collect();
        for name in names {
            let constant = module.take_constant(&name).ok_or(GraphError::UnknownName {
                kind: "constant",
                name: name.clone(),
            })?;
            module.add_placeholder(Placeholder {
                name: constant.name.clone(),
                ty: constant.ty.clone(),
            })?;
            self.stash.push(constant);
        }
        self.active = true;
        Ok(())
    }

    /// Restores the stashed constants and removes the temporary
    /// placeholders.
    pub fn deactivate_and_cleanup(&mut self, module: &mut Module) -> Result<(), GraphError> {
        debug_assert!(self.active, "preventer deactivated while inactive");
        for constant in self.stash.drain(..) {
            module.remove_placeholder(&constant.name);
            module.add_constant(constant)?;
        }
        self.active = false;
        Ok(())
    }
}
