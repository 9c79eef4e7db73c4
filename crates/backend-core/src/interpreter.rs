// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The interpreter backend.
//!
//! A slow-but-universal backend used as the profiling target: when a
//! network is added in profile mode, every device is rebuilt on the
//! interpreter so instrumented execution sees the whole graph.

use crate::{Backend, BackendError, CompiledFunction, SimulatedFunction};
use graph_ir::{BackendOptions, Function, Node, NodeInfo};

/// Reference interpreter: executes anything, lowers everything.
#[derive(Debug, Default)]
pub struct InterpreterBackend;

impl InterpreterBackend {
    pub const NAME: &'static str = "interpreter";
}

impl Backend for InterpreterBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_op_supported(&self, _ni: &NodeInfo<'_>) -> bool {
        true
    }

    fn should_lower(&self, _node: &Node) -> bool {
        true
    }

    fn compile(
        &self,
        function: &Function,
        _opts: &BackendOptions,
    ) -> Result<Box<dyn CompiledFunction>, BackendError> {
        let size = function.activation_bytes() as u64;
        Ok(Box::new(SimulatedFunction::new(function, Self::NAME, size)))
    }
}
