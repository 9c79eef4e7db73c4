// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # executor
//!
//! Executes partitioned networks across devices, one DAG traversal per
//! request.
//!
//! The model:
//! - A fixed pool of worker threads services initial partition dispatches
//!   and completion callbacks.
//! - Device completion callbacks stay cheap: merge the partition's outputs
//!   into the run's scratch, enqueue unblocked children, publish completion.
//!   A partition is handed to its device once every parent has completed;
//!   sibling partitions run concurrently on their devices.
//! - Each run owns one [`ExecutionState`] checked out of a per-network
//!   pool for the duration of the traversal; the completion callback fires
//!   exactly once, with the request context handed back.
//!
//! `shutdown` rejects new runs and blocks until every outstanding
//! completion has been delivered.

mod error;
mod state;
mod thread_pool;

pub use error::ExecutorError;
pub use state::ExecutionState;

use device_manager::DeviceMap;
use graph_ir::ExecutionContext;
use partitioner::Dag;
use state::StatePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;
use thread_pool::WorkerPool;

/// Monotonic request identifier assigned by the host.
pub type RunIdentifier = u64;

/// Exactly-once completion callback for [`ThreadPoolExecutor::run`].
pub type CompletionCallback =
    Box<dyn FnOnce(RunIdentifier, Result<(), ExecutorError>, Box<ExecutionContext>) + Send>;

/// Default pool size when neither P2P nor DRT needs per-request device
/// buffers: one state runs while the next is primed.
const DEFAULT_POOL_SIZE: usize = 2;

struct RunState {
    dag: Arc<Dag>,
    run_id: RunIdentifier,
    remaining_parents: Vec<usize>,
    completed: usize,
    outstanding: usize,
    first_error: Option<ExecutorError>,
    ctx: Option<Box<ExecutionContext>>,
    state: Option<ExecutionState>,
    done: Option<CompletionCallback>,
    pool: Arc<StatePool>,
}

/// The DAG executor: worker threads plus per-network state pools.
pub struct ThreadPoolExecutor {
    devices: DeviceMap,
    workers: Mutex<WorkerPool>,
    pools: Mutex<HashMap<String, Arc<StatePool>>>,
    shutting_down: AtomicBool,
    inflight: Mutex<usize>,
    drained: Condvar,
}

impl ThreadPoolExecutor {
    /// Creates an executor over `devices` with `threads` workers.
    pub fn new(devices: DeviceMap, threads: usize, name: &str) -> Self {
        Self {
            devices,
            workers: Mutex::new(WorkerPool::new(threads, name)),
            pools: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            inflight: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Pre-allocates the execution states for one network.
    ///
    /// With P2P or DRT every in-flight request needs its own device
    /// buffers, so the pool covers `requested` (the host's concurrency
    /// cap); otherwise a small constant suffices.
    pub fn create_pool(&self, root_name: &str, requested: usize, p2p: bool, drt: bool) {
        let size = if p2p || drt {
            requested.max(1)
        } else {
            requested.clamp(1, DEFAULT_POOL_SIZE)
        };
        tracing::debug!("pool for '{root_name}': {size} state(s)");
        self.pools
            .lock()
            .expect("executor pools poisoned")
            .insert(root_name.to_string(), Arc::new(StatePool::new(size)));
    }

    /// Releases a network's execution states.
    ///
    /// The host guarantees no in-flight requests remain for the network.
    pub fn free_pool(&self, root_name: &str) {
        let pool = self
            .pools
            .lock()
            .expect("executor pools poisoned")
            .remove(root_name);
        if let Some(pool) = pool {
            debug_assert!(pool.is_quiescent(), "pool freed with outstanding states");
        }
    }

    /// Traverses `dag` for one request. Non-blocking; `done` fires exactly
    /// once, on an executor or device thread.
    pub fn run(
        self: &Arc<Self>,
        dag: Arc<Dag>,
        ctx: Box<ExecutionContext>,
        run_id: RunIdentifier,
        done: CompletionCallback,
    ) {
        // Count the run before the shutdown check so `shutdown` cannot
        // miss a run that already passed the gate.
        self.inflight_inc();
        if self.shutting_down.load(Ordering::Acquire) {
            self.inflight_dec();
            done(run_id, Err(ExecutorError::ShuttingDown), ctx);
            return;
        }
        let pool = self
            .pools
            .lock()
            .expect("executor pools poisoned")
            .get(dag.root_name())
            .cloned();
        let Some(pool) = pool else {
            self.inflight_dec();
            done(
                run_id,
                Err(ExecutorError::UnknownNetwork(dag.root_name().to_string())),
                ctx,
            );
            return;
        };

        let this = Arc::clone(self);
        let pool_handle = Arc::clone(&pool);
        pool.checkout(Box::new(move |exec_state| {
            this.start_run(dag, ctx, run_id, done, exec_state, pool_handle);
        }));
    }

    /// Blocks new runs, waits for all outstanding completions, and joins
    /// the workers.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        let mut inflight = self.inflight.lock().expect("inflight gauge poisoned");
        while *inflight > 0 {
            inflight = self
                .drained
                .wait(inflight)
                .expect("inflight gauge poisoned");
        }
        drop(inflight);
        self.workers
            .lock()
            .expect("executor workers poisoned")
            .shutdown();
        tracing::info!("executor drained and stopped");
    }

    fn start_run(
        self: Arc<Self>,
        dag: Arc<Dag>,
        mut ctx: Box<ExecutionContext>,
        run_id: RunIdentifier,
        done: CompletionCallback,
        mut exec_state: ExecutionState,
        pool: Arc<StatePool>,
    ) {
        ctx.trace.start_time = Some(Instant::now());
        exec_state.scratch.merge(ctx.take_bindings());

        let entries = dag.entry_children().to_vec();
        let run = Arc::new(Mutex::new(RunState {
            remaining_parents: dag.nodes().iter().map(|n| n.parents.len()).collect(),
            dag,
            run_id,
            completed: 0,
            outstanding: entries.len(),
            first_error: None,
            ctx: Some(ctx),
            state: Some(exec_state),
            done: Some(done),
            pool,
        }));

        for idx in entries {
            let this = Arc::clone(&self);
            let run = Arc::clone(&run);
            self.spawn_job(Box::new(move || this.dispatch_node(run, idx)));
        }
    }

    fn dispatch_node(self: Arc<Self>, run: Arc<Mutex<RunState>>, idx: usize) {
        type Prepared = (
            String,
            Arc<dyn device_manager::DeviceManager>,
            Box<ExecutionContext>,
        );
        let prepared: Result<Prepared, ExecutorError> = {
            let rs = run.lock().expect("run state poisoned");
            let dag = Arc::clone(&rs.dag);
            let node = &dag.nodes()[idx];
            if node.device_runtime_infos.is_empty() {
                Err(ExecutorError::NoDeviceAssigned(node.name.clone()))
            } else {
                let device_id = node.device_runtime_infos
                    [(rs.run_id as usize) % node.device_runtime_infos.len()];
                match self.devices.get(&device_id) {
                    None => Err(ExecutorError::DeviceMissing {
                        node: node.name.clone(),
                        device: device_id,
                    }),
                    Some(dm) => {
                        let scratch =
                            &rs.state.as_ref().expect("state held for run").scratch;
                        let mut sub = Box::new(ExecutionContext::new());
                        for input in &node.inputs {
                            if let Some(tensor) = scratch.get(input) {
                                sub.bindings.insert(input.clone(), tensor.clone());
                            }
                        }
                        Ok((node.name.clone(), Arc::clone(dm), sub))
                    }
                }
            }
        };

        match prepared {
            Ok((name, dm, sub_ctx)) => {
                let this = Arc::clone(&self);
                let run2 = Arc::clone(&run);
                dm.run_function(
                    &name,
                    sub_ctx,
                    Box::new(move |result, returned| {
                        this.on_node_done(run2, idx, result.map_err(Into::into), returned);
                    }),
                );
            }
            Err(e) => {
                self.on_node_done(run, idx, Err(e), Box::new(ExecutionContext::new()));
            }
        }
    }

    /// Services one partition completion. Runs on a device (or worker)
    /// thread and stays cheap: bookkeeping, successor dispatch, completion
    /// publishing.
    fn on_node_done(
        self: Arc<Self>,
        run: Arc<Mutex<RunState>>,
        idx: usize,
        result: Result<(), ExecutorError>,
        mut returned: Box<ExecutionContext>,
    ) {
        let mut ready: Vec<usize> = Vec::new();
        let mut finish = None;
        {
            let mut rs = run.lock().expect("run state poisoned");
            let dag = Arc::clone(&rs.dag);
            match result {
                Err(e) => {
                    tracing::warn!("partition '{}' failed: {e}", dag.nodes()[idx].name);
                    if rs.first_error.is_none() {
                        rs.first_error = Some(e);
                    }
                    rs.completed += 1;
                }
                Ok(()) => {
                    let node = &dag.nodes()[idx];
                    let scratch =
                        &mut rs.state.as_mut().expect("state held for run").scratch;
                    for output in &node.outputs {
                        if let Some(tensor) = returned.bindings.remove(output) {
                            scratch.insert(output.clone(), tensor);
                        }
                    }
                    rs.completed += 1;
                    if rs.first_error.is_none() {
                        for &child in &node.children {
                            rs.remaining_parents[child] -= 1;
                            if rs.remaining_parents[child] == 0 {
                                ready.push(child);
                            }
                        }
                    }
                }
            }
            rs.outstanding -= 1;
            rs.outstanding += ready.len();

            let finished = rs.outstanding == 0
                && (rs.first_error.is_some() || rs.completed == rs.dag.len());
            if finished {
                let mut exec_state = rs.state.take().expect("state held for run");
                let mut ctx = rs.ctx.take().expect("context held for run");
                ctx.bindings = std::mem::take(&mut exec_state.scratch);
                let done = rs.done.take().expect("completion already taken");
                let outcome = match rs.first_error.take() {
                    Some(e) => Err(e),
                    None => Ok(()),
                };
                finish = Some((exec_state, ctx, done, Arc::clone(&rs.pool), outcome, rs.run_id));
            }
        }

        // Successors go straight to their devices: a channel send, nothing
        // more.
        for child in ready {
            Arc::clone(&self).dispatch_node(Arc::clone(&run), child);
        }

        if let Some((exec_state, ctx, done, pool, outcome, run_id)) = finish {
            // Return the state before publishing: a parked run may start
            // with it immediately.
            pool.checkin(exec_state);
            let this = Arc::clone(&self);
            self.spawn_job(Box::new(move || {
                done(run_id, outcome, ctx);
                this.inflight_dec();
            }));
        }
    }

    fn spawn_job(&self, job: Box<dyn FnOnce() + Send>) {
        self.workers
            .lock()
            .expect("executor workers poisoned")
            .execute(job);
    }

    fn inflight_inc(&self) {
        *self.inflight.lock().expect("inflight gauge poisoned") += 1;
    }

    fn inflight_dec(&self) {
        let mut inflight = self.inflight.lock().expect("inflight gauge poisoned");
        *inflight -= 1;
        if *inflight == 0 {
            self.drained.notify_all();
        }
    }
}
