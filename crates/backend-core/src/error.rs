// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for backend compilation and execution.

/// Errors that can occur inside a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No backend is registered under the requested name.
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    /// The function contains a node the backend cannot execute.
    #[error("backend '{backend}' cannot compile '{function}': unsupported node '{node}'")]
    Unsupported {
        backend: &'static str,
        function: String,
        node: String,
    },

    /// A compiled function failed at execution time.
    #[error("execution of '{function}' failed: {detail}")]
    Execution { function: String, detail: String },
}
