// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph construction and manifest loading.

/// Errors that can occur when building or transforming graph IR.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The manifest file could not be read.
    #[error("failed to read manifest: {0}")]
    ManifestReadError(#[from] std::io::Error),

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParseError(#[from] serde_json::Error),

    /// A name is used twice where uniqueness is required.
    #[error("duplicate name '{0}'")]
    DuplicateName(String),

    /// A node input does not resolve to a node, placeholder, or constant.
    #[error("unresolved value '{value}' referenced by node '{node}'")]
    UnresolvedValue { node: String, value: String },

    /// A function, placeholder, or constant lookup failed.
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },

    /// A definition is structurally invalid.
    #[error("invalid {kind} '{name}': {detail}")]
    Invalid {
        kind: &'static str,
        name: String,
        detail: String,
    },
}
