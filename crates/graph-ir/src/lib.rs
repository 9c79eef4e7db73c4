// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! The light intermediate representation the host runtime works with. The
//! compiler proper (lowering, codegen) lives behind the backends; this
//! crate carries only what the runtime needs to partition, verify, and
//! provision networks:
//!
//! - [`Module`] / [`Function`] / [`Node`]: dataflow graphs plus their
//!   named storage ([`Constant`], [`Placeholder`], [`MutabilityKind`]).
//! - [`NodeInfo`]: the per-node view backends use for legality checks.
//! - [`CompilationContext`]: compilation options threaded through
//!   `add_network`, including [`PrecisionMode`] and backend options.
//! - Passes: pre-partition cleanup, constant folding with a
//!   [`ConstantFoldingRecord`], DCE, and the
//!   [`ConstantModificationPreventer`].
//! - [`ExecutionContext`] / [`PlaceholderBindings`]: the per-request
//!   payload handed from callers to devices.
//! - [`NetworkManifest`]: the JSON on-disk form of a module.

mod cctx;
mod context;
mod error;
mod manifest;
mod module;
mod node;
mod passes;

pub use cctx::{
    BackendOptions, CompilationContext, OptimizationOptions, PrecisionConfiguration, PrecisionMode,
};
pub use context::{ExecutionContext, PlaceholderBindings, TraceScope};
pub use error::GraphError;
pub use manifest::{FunctionSpec, NetworkManifest, NodeSpec, TypeSpec, ValueSpec};
pub use module::{Constant, Function, Module, MutabilityKind, Placeholder};
pub use node::{Node, NodeInfo, NodeKind};
pub use passes::{
    cleanup_constant_folding, constant_fold_and_record, optimize_function, run_dce,
    ConstantFoldingRecord, ConstantModificationPreventer,
};
