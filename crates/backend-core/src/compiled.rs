// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compiled function artifacts.
//!
//! A [`CompiledFunction`] is what a backend hands to the provisioner: an
//! opaque executable loaded onto a device and invoked per request. The
//! in-tree backends produce [`SimulatedFunction`]s, which bind the
//! function's outputs and derive their contents from the inputs; real
//! codegen would slot in behind the same trait.

use crate::BackendError;
use graph_ir::{ExecutionContext, Function, Placeholder};

/// An executable artifact produced by [`crate::Backend::compile`].
pub trait CompiledFunction: Send + Sync {
    /// Name of the source function.
    fn name(&self) -> &str;

    /// Name of the backend that produced this artifact.
    fn backend_name(&self) -> &'static str;

    /// Runs the function against the context's bindings.
    ///
    /// Every declared output is bound on return (allocated when the caller
    /// did not pre-bind it).
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), BackendError>;

    /// Estimated resident size of the artifact on a device, in bytes.
    fn size_bytes(&self) -> u64;
}

/// A host-side stand-in for a device binary.
///
/// Execution fills each output with a checksum of the request's input
/// bytes, which is enough for the runtime's own tests to observe that a
/// function ran and which inputs it saw.
pub struct SimulatedFunction {
    name: String,
    backend: &'static str,
    inputs: Vec<Placeholder>,
    outputs: Vec<Placeholder>,
    size_bytes: u64,
}

impl SimulatedFunction {
    /// Builds an artifact for `function`, attributed to `backend`.
    pub fn new(function: &Function, backend: &'static str, size_bytes: u64) -> Self {
        Self {
            name: function.name.clone(),
            backend,
            inputs: function.inputs.clone(),
            outputs: function.outputs.clone(),
            size_bytes,
        }
    }
}

impl CompiledFunction for SimulatedFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend_name(&self) -> &'static str {
        self.backend
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), BackendError> {
        let mut checksum: u8 = 0;
        for input in &self.inputs {
            let tensor = ctx.bindings.get(&input.name).ok_or_else(|| {
                BackendError::Execution {
                    function: self.name.clone(),
                    detail: format!("missing input binding '{}'", input.name),
                }
            })?;
            checksum = tensor
                .as_bytes()
                .iter()
                .fold(checksum, |acc, b| acc.wrapping_add(*b));
        }

        for output in &self.outputs {
            let tensor = ctx.bindings.allocate(output);
            let bytes = tensor.as_bytes_mut();
            if !bytes.is_empty() {
                bytes[0] = checksum.wrapping_add(1);
            }
        }
        Ok(())
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{ElemKind, Shape, Tensor, Type};

    fn ph(name: &str, len: usize) -> Placeholder {
        Placeholder {
            name: name.into(),
            ty: Type::new(ElemKind::Float, Shape::vector(len)),
        }
    }

    fn function() -> Function {
        Function {
            name: "main".into(),
            inputs: vec![ph("in", 2)],
            outputs: vec![ph("out", 2)],
            output_nodes: vec![],
            nodes: vec![],
        }
    }

    #[test]
    fn test_execute_binds_outputs() {
        let f = function();
        let compiled = SimulatedFunction::new(&f, "cpu", 64);

        let mut ctx = ExecutionContext::new();
        ctx.bindings
            .insert("in", Tensor::from_f32(Shape::vector(2), &[0.0, 0.0]).unwrap());

        compiled.execute(&mut ctx).unwrap();
        assert!(ctx.bindings.get("out").is_some());
        assert_eq!(compiled.size_bytes(), 64);
    }

    #[test]
    fn test_execute_missing_input_fails() {
        let f = function();
        let compiled = SimulatedFunction::new(&f, "cpu", 64);

        let mut ctx = ExecutionContext::new();
        let err = compiled.execute(&mut ctx).unwrap_err();
        assert!(matches!(err, BackendError::Execution { .. }));
    }

    #[test]
    fn test_checksum_depends_on_inputs() {
        let f = function();
        let compiled = SimulatedFunction::new(&f, "cpu", 64);

        let mut a = ExecutionContext::new();
        a.bindings
            .insert("in", Tensor::from_f32(Shape::vector(2), &[1.0, 2.0]).unwrap());
        compiled.execute(&mut a).unwrap();

        let mut b = ExecutionContext::new();
        b.bindings
            .insert("in", Tensor::from_f32(Shape::vector(2), &[3.0, 4.0]).unwrap());
        compiled.execute(&mut b).unwrap();

        assert_ne!(
            a.bindings.get("out").unwrap().as_bytes()[0],
            b.bindings.get("out").unwrap().as_bytes()[0],
        );
    }
}
