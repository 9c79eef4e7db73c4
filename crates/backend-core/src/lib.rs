// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # backend-core
//!
//! The backend contract and the in-tree reference backends.
//!
//! A backend is a capability set over the graph IR:
//! - [`Backend::is_op_supported`]: a pure, total legality predicate over
//!   node kind and slot element types.
//! - [`Backend::should_lower`]: whether generic lowering should expand a
//!   high-level node before the backend sees it.
//! - [`Backend::compile`]: produce a loadable [`CompiledFunction`].
//! - [`Backend::verify`]: check a function post-transformation.
//!
//! Two backends ship in-tree: [`CpuBackend`] (the reference legality
//! table) and [`InterpreterBackend`] (the universal profiling target).
//! Concrete accelerators register through [`create_backend`].

mod compiled;
mod cpu;
mod error;
mod interpreter;

pub use compiled::{CompiledFunction, SimulatedFunction};
pub use cpu::CpuBackend;
pub use error::BackendError;
pub use interpreter::InterpreterBackend;

use graph_ir::{BackendOptions, Function, Node, NodeInfo, PrecisionConfiguration};
use std::sync::Arc;
use tensor_core::ElemKind;

/// The backend used when a network is added in profiling mode.
pub const PROFILING_BACKEND: &str = InterpreterBackend::NAME;

/// A compilation target with its capability set.
pub trait Backend: Send + Sync {
    /// Registry name of this backend.
    fn name(&self) -> &'static str;

    /// Whether the backend can execute a node with these slot types.
    ///
    /// Total over [`graph_ir::NodeKind`]: kinds the backend does not know
    /// return `false`.
    fn is_op_supported(&self, node_info: &NodeInfo<'_>) -> bool;

    /// Whether generic lowering should expand this node before
    /// backend-specific compilation.
    fn should_lower(&self, node: &Node) -> bool;

    /// Compiles one function into a loadable artifact.
    fn compile(
        &self,
        function: &Function,
        opts: &BackendOptions,
    ) -> Result<Box<dyn CompiledFunction>, BackendError>;

    /// Checks that every node of `function` is executable here.
    fn verify(&self, function: &Function, verbose: bool) -> bool {
        for node in &function.nodes {
            if !self.is_op_supported(&node.info()) {
                if verbose {
                    tracing::warn!(
                        "backend '{}' rejects node '{}' ({}) in '{}'",
                        self.name(),
                        node.name,
                        node.kind,
                        function.name,
                    );
                }
                return false;
            }
        }
        true
    }

    /// Whether index tensors may be demoted from `from` to `to` on this
    /// backend; populates the blacklist of node kinds that must keep their
    /// declared index width.
    fn can_do_index_type_demotion(
        &self,
        _from: ElemKind,
        _to: ElemKind,
        _precision: &mut PrecisionConfiguration,
    ) -> bool {
        false
    }
}

/// Instantiates a backend by registry name.
pub fn create_backend(name: &str) -> Result<Arc<dyn Backend>, BackendError> {
    match name {
        CpuBackend::NAME => Ok(Arc::new(CpuBackend)),
        InterpreterBackend::NAME => Ok(Arc::new(InterpreterBackend)),
        other => Err(BackendError::UnknownBackend(other.to_string())),
    }
}
