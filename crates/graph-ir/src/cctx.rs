// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compilation context: everything `add_network` needs to know about how a
//! module should be compiled and published.

use crate::NodeKind;
use std::collections::{BTreeMap, BTreeSet};

/// Precision handling for a compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrecisionMode {
    /// Quantize using previously collected profiles.
    Quantize,
    /// Instrument the network to collect quantization profiles.
    Profile,
    /// Leave precision untouched.
    #[default]
    None,
}

/// Precision configuration, including the node kinds excluded from index
/// type demotion by the chosen backend.
#[derive(Debug, Clone, Default)]
pub struct PrecisionConfiguration {
    pub mode: PrecisionMode,
    pub demotion_blacklist: BTreeSet<NodeKind>,
}

/// Backend-directed options.
///
/// `backend_specific_opts` are free-form key/value pairs forwarded to the
/// backend. A non-empty `backend_specific_node_info` signals that the
/// functions were pre-optimized with per-node annotations and must not be
/// mutated again before partitioning.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    pub backend_specific_opts: BTreeMap<String, String>,
    pub backend_specific_node_info: BTreeMap<String, BTreeMap<String, String>>,
}

/// Optimization toggles.
#[derive(Debug, Clone, Default)]
pub struct OptimizationOptions {
    /// Swap constants for temporary placeholders during compilation so that
    /// no pass can modify them, then fold with recording at the end.
    pub delay_and_record_constant_modification: bool,
}

/// The full compilation context threaded through `add_network`.
#[derive(Debug, Clone, Default)]
pub struct CompilationContext {
    pub precision: PrecisionConfiguration,
    pub backend_opts: BackendOptions,
    pub optimization_opts: OptimizationOptions,
    /// Serialize the final partitioned DAG next to the process.
    pub serialize_compiled_dag: bool,
    /// Keep constant payloads in the module after provisioning.
    pub skip_module_strip: bool,
    /// On a failed add, dump each function's final graph for debugging.
    pub dump_final_graph: bool,
    /// Enable direct device-to-device transfers.
    pub enable_p2p: bool,
    /// Enable device-resident tensors.
    pub enable_drt: bool,
    /// Run the vendor DAG optimizer hook after partitioning.
    pub call_dag_optimizer: bool,
    /// Verbose backend verification output.
    pub verbose_compile: bool,
}

impl CompilationContext {
    /// Key in `backend_specific_opts` that points at an options file to
    /// load at `add_network` time.
    pub const LOAD_BACKEND_SPECIFIC_OPTIONS: &'static str = "loadBackendSpecificOptions";
}
