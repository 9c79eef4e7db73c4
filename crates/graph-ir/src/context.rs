// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-request execution payloads.
//!
//! An [`ExecutionContext`] travels with one inference request from
//! submission through device execution back to the caller. It owns the
//! placeholder bindings (inputs supplied by the caller, outputs filled by
//! devices) and a [`TraceScope`] of coarse request timestamps.

use crate::Placeholder;
use std::collections::BTreeMap;
use std::time::Instant;
use tensor_core::Tensor;

/// Name-to-tensor bindings for a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderBindings {
    map: BTreeMap<String, Tensor>,
}

impl PlaceholderBindings {
    /// Creates empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `tensor`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.map.insert(name.into(), tensor);
    }

    /// Returns the tensor bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.map.get(name)
    }

    /// Returns the tensor bound to `name`, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tensor> {
        self.map.get_mut(name)
    }

    /// Ensures a zero-filled binding exists for the placeholder.
    pub fn allocate(&mut self, placeholder: &Placeholder) -> &mut Tensor {
        self.map
            .entry(placeholder.name.clone())
            .or_insert_with(|| Tensor::zeroed(placeholder.ty.clone()))
    }

    /// Removes and returns the tensor bound to `name`.
    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.map.remove(name)
    }

    /// Moves every binding of `other` into `self` (later bindings win).
    pub fn merge(&mut self, other: PlaceholderBindings) {
        self.map.extend(other.map);
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` when no bindings exist.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over bound names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

/// Coarse request-level timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceScope {
    /// When the host accepted the request.
    pub receive_time: Option<Instant>,
    /// When the executor started traversing the DAG.
    pub start_time: Option<Instant>,
    /// When the completion callback fired.
    pub stop_time: Option<Instant>,
}

impl TraceScope {
    /// End-to-end duration, when both endpoints were recorded.
    pub fn e2e_duration(&self) -> Option<std::time::Duration> {
        match (self.receive_time, self.stop_time) {
            (Some(a), Some(b)) => Some(b.duration_since(a)),
            _ => None,
        }
    }
}

/// Everything a single request carries through the runtime.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub bindings: PlaceholderBindings,
    pub trace: TraceScope,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context around existing bindings.
    pub fn from_bindings(bindings: PlaceholderBindings) -> Self {
        Self {
            bindings,
            trace: TraceScope::default(),
        }
    }

    /// Moves the bindings out, leaving the context empty.
    ///
    /// Used by the blocking wrappers to hand borrowed bindings back to the
    /// caller without cloning.
    pub fn take_bindings(&mut self) -> PlaceholderBindings {
        std::mem::take(&mut self.bindings)
    }
}
