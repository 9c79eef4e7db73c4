// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reusable per-request execution states.
//!
//! An [`ExecutionState`] is the scratch a single in-flight request owns
//! while its DAG is traversed: the working set of bindings that
//! intermediate values flow through. States are pooled per network so that
//! steady-state inference allocates nothing; a request checks one out for
//! its whole run and returns it on completion.
//!
//! Checkout never blocks: when the pool is dry, the run is parked and
//! started by whichever completion next returns a state.

use graph_ir::PlaceholderBindings;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scratch owned by one in-flight request.
#[derive(Debug, Default)]
pub struct ExecutionState {
    /// Working bindings: request inputs, intermediates, outputs.
    pub scratch: PlaceholderBindings,
}

type ParkedRun = Box<dyn FnOnce(ExecutionState) + Send>;

struct PoolInner {
    states: Vec<ExecutionState>,
    parked: VecDeque<ParkedRun>,
}

/// A per-network pool of [`ExecutionState`]s.
pub(crate) struct StatePool {
    size: usize,
    inner: Mutex<PoolInner>,
}

impl StatePool {
    pub(crate) fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            inner: Mutex::new(PoolInner {
                states: (0..size).map(|_| ExecutionState::default()).collect(),
                parked: VecDeque::new(),
            }),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Hands a state to `start`, now when one is free, otherwise when the
    /// next completion returns one.
    pub(crate) fn checkout(&self, start: ParkedRun) {
        let state = {
            let mut inner = self.inner.lock().expect("state pool poisoned");
            match inner.states.pop() {
                Some(state) => Some(state),
                None => {
                    inner.parked.push_back(start);
                    return;
                }
            }
        };
        if let Some(state) = state {
            start(state);
        }
    }

    /// Returns a state; a parked run, if any, takes it immediately.
    pub(crate) fn checkin(&self, mut state: ExecutionState) {
        state.scratch = PlaceholderBindings::new();
        let parked = {
            let mut inner = self.inner.lock().expect("state pool poisoned");
            match inner.parked.pop_front() {
                Some(run) => Some(run),
                None => {
                    inner.states.push(state);
                    return;
                }
            }
        };
        if let Some(run) = parked {
            run(state);
        }
    }

    /// True when every state is back and nothing is parked.
    pub(crate) fn is_quiescent(&self) -> bool {
        let inner = self.inner.lock().expect("state pool poisoned");
        inner.states.len() == self.size && inner.parked.is_empty()
    }
}
