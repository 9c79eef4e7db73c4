// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully specified tensor types: element kind + shape + quantization params.

use crate::{ElemKind, Shape};

/// A complete tensor type.
///
/// For quantized element kinds the `scale`/`offset` pair maps stored
/// integers back to real values (`real = scale * (q - offset)`). For
/// non-quantized kinds they are fixed at `1.0`/`0`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Type {
    /// Element kind of every value in the tensor.
    pub elem: ElemKind,
    /// Dimensionality.
    pub shape: Shape,
    /// Quantization scale (1.0 for non-quantized kinds).
    pub scale: f64,
    /// Quantization offset (0 for non-quantized kinds).
    pub offset: i32,
}

impl Type {
    /// Creates a non-quantized type.
    pub fn new(elem: ElemKind, shape: Shape) -> Self {
        Self {
            elem,
            shape,
            scale: 1.0,
            offset: 0,
        }
    }

    /// Creates a quantized type with an explicit scale and offset.
    pub fn quantized(elem: ElemKind, shape: Shape, scale: f64, offset: i32) -> Self {
        Self {
            elem,
            shape,
            scale,
            offset,
        }
    }

    /// Returns `true` if the element kind is quantized.
    pub fn is_quantized(&self) -> bool {
        self.elem.is_quantized()
    }

    /// Memory footprint of a tensor of this type, in bytes.
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.elem)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_quantized() {
            write!(
                f,
                "{}{}@{}:{}",
                self.elem, self.shape, self.scale, self.offset
            )
        } else {
            write!(f, "{}{}", self.elem, self.shape)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_type() {
        let t = Type::new(ElemKind::Float, Shape::matrix(2, 3));
        assert!(!t.is_quantized());
        assert_eq!(t.size_bytes(), 24);
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.offset, 0);
    }

    #[test]
    fn test_quantized_type() {
        let t = Type::quantized(ElemKind::Int8Q, Shape::vector(16), 0.05, -3);
        assert!(t.is_quantized());
        assert_eq!(t.size_bytes(), 16);
        assert_eq!(t.offset, -3);
    }

    #[test]
    fn test_display() {
        let t = Type::new(ElemKind::Float, Shape::matrix(1, 4));
        assert_eq!(format!("{t}"), "float[1, 4]");

        let q = Type::quantized(ElemKind::Int8Q, Shape::vector(2), 0.5, 1);
        assert_eq!(format!("{q}"), "i8q[2]@0.5:1");
    }
}
