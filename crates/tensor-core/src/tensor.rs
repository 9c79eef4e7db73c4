// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Typed tensor payloads.
//!
//! The host runtime treats tensor contents as opaque bytes: compute kernels
//! live behind compiled functions, not here. A [`Tensor`] pairs a [`Type`]
//! with a byte buffer of exactly the right length and exposes the few typed
//! views the host paths need (zero-fill, float access for test payloads).

use crate::{ElemKind, TensorError, Type};

/// An owned tensor: a [`Type`] plus its backing bytes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tensor {
    ty: Type,
    data: Vec<u8>,
}

impl Tensor {
    /// Creates a zero-filled tensor of the given type.
    pub fn zeroed(ty: Type) -> Self {
        let len = ty.size_bytes();
        Self {
            ty,
            data: vec![0u8; len],
        }
    }

    /// Creates a tensor from raw bytes.
    ///
    /// Fails when the byte length does not match the type's footprint.
    pub fn from_bytes(ty: Type, data: Vec<u8>) -> Result<Self, TensorError> {
        let expected = ty.size_bytes();
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { ty, data })
    }

    /// Creates a `Float` tensor from an `f32` slice.
    pub fn from_f32(shape: crate::Shape, values: &[f32]) -> Result<Self, TensorError> {
        let ty = Type::new(ElemKind::Float, shape);
        let expected = ty.size_bytes();
        if values.len() * 4 != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: values.len() * 4,
            });
        }
        let mut data = Vec::with_capacity(expected);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Ok(Self { ty, data })
    }

    /// Returns the tensor's type.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Returns the payload size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the raw bytes mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Decodes a `Float` tensor into `f32` values.
    ///
    /// Fails when the element kind is not `Float`.
    pub fn to_f32(&self) -> Result<Vec<f32>, TensorError> {
        if self.ty.elem != ElemKind::Float {
            return Err(TensorError::UnsupportedElemKind {
                op: "to_f32",
                elem: self.ty.elem,
            });
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
