// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Registered network state.

use graph_ir::Module;
use partitioner::Dag;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One registered network.
///
/// The module is shared across every network produced by the same
/// `add_network` call and dropped when the last of them is removed. The
/// refcount counts in-flight requests and acts as the removal barrier:
/// a network is never erased while it is non-zero.
pub(crate) struct NetworkData {
    pub dag: Arc<Dag>,
    pub module: Arc<Module>,
    refcount: AtomicUsize,
}

impl NetworkData {
    pub(crate) fn new(dag: Dag, module: Arc<Module>) -> Self {
        Self {
            dag: Arc::new(dag),
            module,
            refcount: AtomicUsize::new(0),
        }
    }

    pub(crate) fn refcount(&self) -> usize {
        self.refcount.load(Ordering::SeqCst)
    }

    pub(crate) fn acquire(&self) {
        self.refcount.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        let previous = self.refcount.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "network refcount went negative");
    }
}
