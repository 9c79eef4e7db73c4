// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for partitioning.

/// Errors that can occur while partitioning a module onto devices.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// No devices were supplied.
    #[error("cannot partition: no devices")]
    NoDevices,

    /// No device backend can execute a node.
    #[error("no backend can execute node '{node}' ({kind}) in function '{function}'")]
    UnsupportedNode {
        function: String,
        node: String,
        kind: String,
    },

    /// A single partition exceeds every candidate device's memory.
    #[error(
        "partition of '{function}' needs {needed} bytes but the largest \
         '{backend}' device offers {available}"
    )]
    OutOfMemory {
        function: String,
        backend: String,
        needed: u64,
        available: u64,
    },

    /// A backend named by a device config does not exist.
    #[error(transparent)]
    Backend(#[from] backend_core::BackendError),

    /// The produced DAG failed validation.
    #[error("invalid DAG for '{function}': {detail}")]
    InvalidDag { function: String, detail: String },
}
