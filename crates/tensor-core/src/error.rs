// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor payloads.

/// Errors that can occur when constructing or viewing tensors.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer size does not match the expected size for the type.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// The requested view is not valid for this element kind.
    #[error("unsupported element kind {elem:?} for {op}")]
    UnsupportedElemKind {
        op: &'static str,
        elem: crate::ElemKind,
    },
}
