// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The host manager: the public facade over devices, networks, and
//! requests.
//!
//! Three lifecycles meet here and the locking reflects it:
//!
//! - `state` (readers-writer) guards the network registry, the
//!   in-progress name reservations, and the device table. Writers:
//!   construction, `add_network` (reservation and publish), and the
//!   teardown paths. Readers: the request paths.
//! - `infer_queue` (mutex) guards the admission queue. The length check
//!   and the push happen in one critical section, so the queue bound
//!   holds under concurrency. Acquired strictly after `state`.
//!
//! `run_network` is non-blocking: it either refuses the request inline or
//! enqueues it and, when a concurrency slot is free, pumps the dispatch
//! loop. Completions decrement the target network's refcount, update the
//! counters, invoke the caller, and pump the loop again.

use crate::network::NetworkData;
use crate::request::InferRequest;
use crate::serialize::{dump_function_dot, write_dag_artifact};
use crate::{
    stats, HostConfig, HostError, HostOptions, OneErr, Provisioner, ResultCallback,
    RunIdentifier, StatsRegistry,
};
use backend_core::{Backend, PROFILING_BACKEND};
use device_manager::{
    load_device_configs_from_file, DeviceConfig, DeviceManager, DeviceMap,
    InProcessDeviceManager,
};
use executor::ThreadPoolExecutor;
use graph_ir::{
    cleanup_constant_folding, constant_fold_and_record, optimize_function,
    CompilationContext, ConstantFoldingRecord, ConstantModificationPreventer,
    ExecutionContext, Module, PlaceholderBindings, PrecisionMode,
};
use partitioner::{Dag, Partitioner};
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::time::Instant;

struct HostState {
    networks: HashMap<String, NetworkData>,
    processing_networks: HashSet<String>,
    devices: DeviceMap,
    provisioner: Arc<Provisioner>,
    executor: Arc<ThreadPoolExecutor>,
}

struct HostInner {
    config: HostConfig,
    options: HostOptions,
    state: RwLock<HostState>,
    infer_queue: Mutex<BinaryHeap<InferRequest>>,
    active_request_count: AtomicUsize,
    total_request_count: AtomicU64,
    stats: StatsRegistry,
    backend_opts_warnings: AtomicU64,
}

/// The process-wide orchestrator: accepts compiled modules, provisions
/// them across devices, and dispatches inference requests.
pub struct HostManager {
    inner: Arc<HostInner>,
}

impl HostManager {
    /// Builds a host over `device_configs` (replaced by the configs file
    /// when `options.load_device_configs` is set), creates and
    /// initializes every device, and stands up the provisioner and
    /// executor. Any device init failure is fatal.
    pub fn new(
        device_configs: Vec<DeviceConfig>,
        config: HostConfig,
        options: HostOptions,
    ) -> Result<Self, HostError> {
        let device_configs = match &options.load_device_configs {
            Some(path) => load_device_configs_from_file(path)?,
            None => device_configs,
        };

        let mut devices = DeviceMap::new();
        for (id, mut device_config) in device_configs.into_iter().enumerate() {
            if !device_config.has_name() {
                device_config.name = Some(format!("config{id}"));
            }
            let dm = Arc::new(InProcessDeviceManager::new(id, device_config));
            dm.init()?;
            devices.insert(id, dm);
        }

        let provisioner = Arc::new(Provisioner::new(devices.clone()));
        let executor = Arc::new(ThreadPoolExecutor::new(
            devices.clone(),
            config.executor_threads,
            "host-executor",
        ));

        let inner = Arc::new(HostInner {
            config,
            options,
            state: RwLock::new(HostState {
                networks: HashMap::new(),
                processing_networks: HashSet::new(),
                devices,
                provisioner,
                executor,
            }),
            infer_queue: Mutex::new(BinaryHeap::new()),
            active_request_count: AtomicUsize::new(0),
            total_request_count: AtomicU64::new(0),
            stats: StatsRegistry::new(),
            backend_opts_warnings: AtomicU64::new(0),
        });
        inner.export_memory_counters();
        Ok(Self { inner })
    }

    /// `new` with default sizing and no process-level options.
    pub fn with_defaults(device_configs: Vec<DeviceConfig>) -> Result<Self, HostError> {
        Self::new(device_configs, HostConfig::default(), HostOptions::default())
    }

    /// The host's sizing configuration.
    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// The exported counter registry.
    pub fn stats(&self) -> &StatsRegistry {
        &self.inner.stats
    }

    /// Compiles, partitions, provisions, and publishes every function of
    /// `module` as a runnable network.
    pub fn add_network(
        &self,
        module: Module,
        mut cctx: CompilationContext,
    ) -> Result<(), HostError> {
        let mut module = module;
        match self.add_network_impl(&mut module, &mut cctx) {
            Ok(()) => Ok(()),
            Err(e) => {
                if cctx.dump_final_graph {
                    for function in module.functions() {
                        match dump_function_dot(function) {
                            Ok(path) => tracing::info!(
                                "dumping final graph due to error to {}",
                                path.display()
                            ),
                            Err(dump_err) => {
                                tracing::warn!("final graph dump failed: {dump_err}")
                            }
                        }
                    }
                }
                Err(e)
            }
        }
    }

    fn add_network_impl(
        &self,
        module: &mut Module,
        cctx: &mut CompilationContext,
    ) -> Result<(), HostError> {
        let names: Vec<String> = module
            .functions()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(());
        }

        // Reserve every function name, or fail without touching anything.
        {
            let mut st = self.inner.state.write().expect("host state poisoned");
            let mut inserted: Vec<String> = Vec::new();
            for name in &names {
                if st.networks.contains_key(name) || st.processing_networks.contains(name) {
                    for reserved in &inserted {
                        st.processing_networks.remove(reserved);
                    }
                    return Err(HostError::Runtime(format!(
                        "failed to add network: already have a function called {name}"
                    )));
                }
                st.processing_networks.insert(name.clone());
                inserted.push(name.clone());
            }
        }

        match self.compile_and_provision(module, cctx) {
            Ok(dags) => {
                self.publish(module, cctx, dags, &names);
                Ok(())
            }
            Err(e) => {
                self.cleanup_add_network(&names);
                Err(e)
            }
        }
    }

    /// Steps between name reservation and publish; any error unwinds to
    /// `cleanup_add_network` in the caller.
    fn compile_and_provision(
        &self,
        module: &mut Module,
        cctx: &mut CompilationContext,
    ) -> Result<Vec<Dag>, HostError> {
        self.merge_backend_options(cctx)?;

        let device_info = {
            let st = self.inner.state.read().expect("host state poisoned");
            st.devices
                .values()
                .map(|dm| dm.device_info())
                .collect::<Vec<_>>()
        };

        let mut preventer = ConstantModificationPreventer::new();
        if cctx.optimization_opts.delay_and_record_constant_modification {
            preventer.activate(module)?;
        }

        // Functions carrying per-node backend annotations were already
        // optimized and must not be mutated again.
        let skip_optimizations = !cctx.backend_opts.backend_specific_node_info.is_empty();
        if !skip_optimizations {
            for function in module.functions_mut() {
                optimize_function(function)?;
            }
        }

        let p2p = cctx.enable_p2p || self.inner.options.enable_p2p;
        let drt = cctx.enable_drt || self.inner.options.enable_drt;
        let context_count = if p2p || drt {
            self.inner.config.max_active_requests
        } else {
            2
        };
        let mut dags = Partitioner::new(device_info, context_count).partition(module)?;

        if cctx.precision.mode == PrecisionMode::Profile {
            self.rebuild_for_profiling(&mut dags)?;
        }

        let mut record = ConstantFoldingRecord::default();
        if cctx.optimization_opts.delay_and_record_constant_modification {
            preventer.deactivate_and_cleanup(module)?;
            if dags.len() != 1 {
                return Err(HostError::Runtime("expected exactly one DAG".into()));
            }
            let provisioner = {
                let st = self.inner.state.read().expect("host state poisoned");
                Arc::clone(&st.provisioner)
            };
            let node_specs: Vec<(String, String)> = dags[0]
                .nodes()
                .iter()
                .map(|n| (n.name.clone(), n.backend_name.clone()))
                .collect();
            for (node_name, backend_name) in node_specs {
                record.merge(constant_fold_and_record(module, &node_name)?);
                let function = module
                    .function_mut(&node_name)
                    .ok_or_else(|| {
                        HostError::Runtime(format!("function {node_name} not found"))
                    })?;
                graph_ir::run_dce(function);
                let backend = provisioner.get_backend(&backend_name)?;
                let function = module
                    .function(&node_name)
                    .expect("function verified above");
                if !backend.verify(function, cctx.verbose_compile) {
                    return Err(HostError::Runtime(format!(
                        "unsupported node(s) found after optimizing function {node_name} \
                         for backend {}",
                        backend.name()
                    )));
                }
            }
        }

        #[cfg(feature = "dag-optimizer")]
        if cctx.call_dag_optimizer {
            crate::dag_opt::optimize_dags(&mut dags)?;
        }

        if cctx.serialize_compiled_dag {
            let path = write_dag_artifact(&dags[0], &record)?;
            tracing::info!("serializing DAG to {}", path.display());
        }

        cleanup_constant_folding(module, &record);

        // Provision every DAG; unwind the ones already placed on failure.
        let provisioner = {
            let st = self.inner.state.read().expect("host state poisoned");
            Arc::clone(&st.provisioner)
        };
        for idx in 0..dags.len() {
            if let Err(e) = provisioner.provision(&mut dags[idx], module, cctx) {
                for done in dags.iter_mut().take(idx) {
                    provisioner.unprovision(done);
                }
                return Err(e);
            }
        }

        let executor = {
            let st = self.inner.state.read().expect("host state poisoned");
            Arc::clone(&st.executor)
        };
        for dag in &dags {
            executor.create_pool(
                dag.root_name(),
                self.inner.config.max_active_requests,
                p2p,
                drt,
            );
        }

        Ok(dags)
    }

    /// Step 14: strip constants, share the module, and move the DAGs into
    /// the registry under an exclusive lock.
    fn publish(
        &self,
        module: &mut Module,
        cctx: &CompilationContext,
        dags: Vec<Dag>,
        names: &[String],
    ) {
        if !cctx.skip_module_strip {
            module.strip();
        }
        let shared = Arc::new(std::mem::take(module));

        let mut st = self.inner.state.write().expect("host state poisoned");
        for dag in dags {
            let name = dag.root_name().to_string();
            st.networks
                .insert(name, NetworkData::new(dag, Arc::clone(&shared)));
        }
        for name in names {
            st.processing_networks.remove(name);
        }
        self.inner.export_memory_counters_for(&st.devices);
    }

    /// Merges the process-level or context-referenced backend options
    /// file into the compilation context.
    fn merge_backend_options(&self, cctx: &mut CompilationContext) -> Result<(), HostError> {
        if let Some(path) = &self.inner.options.load_backend_specific_opts {
            if !cctx.backend_opts.backend_specific_opts.is_empty() {
                let n = self
                    .inner
                    .backend_opts_warnings
                    .fetch_add(1, Ordering::Relaxed);
                if n % 1000 == 0 {
                    tracing::warn!(
                        "backend-specific options are set via the host; ignoring \
                         previously set options"
                    );
                }
            }
            cctx.backend_opts.backend_specific_opts = load_options_file(path)?;
        } else if let Some(path) = cctx
            .backend_opts
            .backend_specific_opts
            .get(CompilationContext::LOAD_BACKEND_SPECIFIC_OPTIONS)
            .cloned()
        {
            cctx.backend_opts.backend_specific_opts = load_options_file(Path::new(&path))?;
        }
        Ok(())
    }

    /// Profile mode: rebuild every device on the profiling backend and
    /// replace the provisioner and executor so the instrumented network
    /// compiles and runs there.
    fn rebuild_for_profiling(&self, dags: &mut [Dag]) -> Result<(), HostError> {
        let mut st = self.inner.state.write().expect("host state poisoned");
        if !st.networks.is_empty() {
            return Err(HostError::Runtime(
                "for the quantization profiling flow, there can't be other registered \
                 networks before this one"
                    .into(),
            ));
        }

        let mut rebuilt = DeviceMap::new();
        for (&id, old) in st.devices.iter() {
            let config = DeviceConfig::new(PROFILING_BACKEND, old.maximum_memory())
                .with_name(old.name());
            let dm = Arc::new(InProcessDeviceManager::new(id, config));
            dm.init()?;
            rebuilt.insert(id, dm);
        }
        let mut stop_errors = OneErr::new();
        for dm in st.devices.values() {
            stop_errors.set(dm.stop().map_err(Into::into));
        }
        stop_errors.into_result()?;

        st.devices = rebuilt.clone();
        st.provisioner = Arc::new(Provisioner::new(rebuilt.clone()));
        st.executor = Arc::new(ThreadPoolExecutor::new(
            rebuilt,
            self.inner.config.executor_threads,
            "host-executor",
        ));

        for dag in dags.iter_mut() {
            for node in dag.nodes_mut() {
                node.backend_name = PROFILING_BACKEND.to_string();
            }
        }
        tracing::info!("devices rebuilt on '{PROFILING_BACKEND}' for profiling");
        Ok(())
    }

    /// Releases name reservations after a failed add and refreshes the
    /// memory counters.
    fn cleanup_add_network(&self, names: &[String]) {
        let mut st = self.inner.state.write().expect("host state poisoned");
        for name in names {
            st.processing_networks.remove(name);
        }
        self.inner.export_memory_counters_for(&st.devices);
    }

    /// Removes a published network.
    ///
    /// Unknown names succeed (idempotent). A network still being added or
    /// with in-flight requests fails with `NetBusy`.
    pub fn remove_network(&self, network_name: &str) -> Result<(), HostError> {
        let mut st = self.inner.state.write().expect("host state poisoned");
        if !st.networks.contains_key(network_name) {
            return Ok(());
        }
        if st.processing_networks.contains(network_name) {
            return Err(HostError::NetBusy(format!(
                "cannot remove the network {network_name}, as it is currently being modified"
            )));
        }
        let refcount = st.networks[network_name].refcount();
        if refcount != 0 {
            return Err(HostError::NetBusy(format!(
                "cannot remove the network {network_name}, as there are still {refcount} \
                 outstanding run(s)"
            )));
        }

        let data = st
            .networks
            .remove(network_name)
            .expect("network checked above");
        tracing::debug!(
            "removing '{network_name}' (module shared by {} owner(s))",
            Arc::strong_count(&data.module),
        );
        // The pool must go before the network data: execution states key
        // off the DAG root.
        st.executor.free_pool(network_name);

        let mut err = OneErr::new();
        for node in data.dag.nodes() {
            for &device_id in &node.device_runtime_infos {
                err.set(st.provisioner.evict_function(&node.name, device_id));
            }
            err.set(st.provisioner.remove_function(&node.name));
        }
        self.inner.export_memory_counters_for(&st.devices);
        err.into_result()
    }

    /// Returns `true` when `network_name` is published.
    pub fn network_added(&self, network_name: &str) -> bool {
        let st = self.inner.state.read().expect("host state poisoned");
        st.networks.contains_key(network_name)
    }

    /// Returns the partitioned DAG of a published network.
    pub fn get_network_dag(&self, network_name: &str) -> Result<Arc<Dag>, HostError> {
        let st = self.inner.state.read().expect("host state poisoned");
        st.networks
            .get(network_name)
            .map(|data| Arc::clone(&data.dag))
            .ok_or_else(|| HostError::Runtime("network not found".into()))
    }

    /// Backend lookup, via the provisioner's cache.
    pub fn get_backend(&self, backend_name: &str) -> Result<Arc<dyn Backend>, HostError> {
        let provisioner = {
            let st = self.inner.state.read().expect("host state poisoned");
            Arc::clone(&st.provisioner)
        };
        provisioner.get_backend(backend_name)
    }

    /// Starts the trace sink on every device; first failure returns.
    pub fn start_device_trace(&self) -> Result<(), HostError> {
        let st = self.inner.state.read().expect("host state poisoned");
        for dm in st.devices.values() {
            dm.start_device_trace()?;
        }
        Ok(())
    }

    /// Stops the trace sink on every device; first failure returns.
    pub fn stop_device_trace(&self) -> Result<(), HostError> {
        let st = self.inner.state.read().expect("host state poisoned");
        for dm in st.devices.values() {
            dm.stop_device_trace()?;
        }
        Ok(())
    }

    /// Submits one inference request. Non-blocking.
    ///
    /// The callback fires exactly once: inline with `NetNotFound` or
    /// `RequestRefused` when the request cannot be admitted, otherwise
    /// from the completion path.
    pub fn run_network(
        &self,
        network_name: &str,
        mut context: Box<ExecutionContext>,
        callback: ResultCallback,
        priority: u64,
    ) -> RunIdentifier {
        let run_id = self.inner.total_request_count.fetch_add(1, Ordering::SeqCst);
        let start_time = Instant::now();
        context.trace.receive_time = Some(start_time);

        {
            let st = self.inner.state.read().expect("host state poisoned");
            let Some(network) = st.networks.get(network_name) else {
                drop(st);
                callback(
                    run_id,
                    Err(HostError::NetNotFound(format!(
                        "function {network_name} not found"
                    ))),
                    context,
                );
                return run_id;
            };
            network.acquire();

            // Admission check and push in one critical section: a stale
            // length read must never overfill the queue.
            let mut queue = self.inner.infer_queue.lock().expect("infer queue poisoned");
            let queue_size = queue.len();
            if queue_size >= self.inner.config.max_queue_size {
                network.release();
                drop(queue);
                drop(st);
                callback(
                    run_id,
                    Err(HostError::RequestRefused(format!(
                        "the number of allowed queued requests has been exceeded. queued \
                         requests: {queue_size} allowed requests: {}",
                        self.inner.config.max_queue_size
                    ))),
                    context,
                );
                return run_id;
            }
            queue.push(InferRequest {
                network_name: network_name.to_string(),
                context,
                callback,
                priority,
                request_id: run_id,
                start_time,
            });
        }

        // Claim a concurrency slot if one is free and pump the queue;
        // otherwise an in-flight completion will pump it for us.
        let active = self
            .inner
            .active_request_count
            .fetch_add(1, Ordering::SeqCst);
        if active < self.inner.config.max_active_requests {
            HostInner::dispatch_next_run(&self.inner);
        } else {
            self.inner
                .active_request_count
                .fetch_sub(1, Ordering::SeqCst);
            // The request stays queued; with the slot cap reached there is
            // at least one outstanding completion to drain it.
            debug_assert!(active >= self.inner.config.max_active_requests);
        }
        run_id
    }

    /// Synchronous wrapper over [`HostManager::run_network`] for callers
    /// holding bindings. The bindings are borrowed for the duration and
    /// handed back, updated, on return.
    ///
    /// Must not be called from a completion callback targeting the same
    /// network: the wrapper waits on a completion that would be queued
    /// behind the caller.
    pub fn run_network_blocking(
        &self,
        network_name: &str,
        bindings: &mut PlaceholderBindings,
    ) -> Result<(), HostError> {
        let context = Box::new(ExecutionContext::from_bindings(std::mem::take(bindings)));
        let (tx, rx) = mpsc::channel();
        self.run_network(
            network_name,
            context,
            Box::new(move |_, result, mut ctx| {
                let _ = tx.send((result, ctx.take_bindings()));
            }),
            0,
        );
        let (result, returned) = rx
            .recv()
            .map_err(|_| HostError::Runtime("completion channel closed".into()))?;
        *bindings = returned;
        result
    }

    /// Synchronous wrapper that round-trips a full execution context.
    pub fn run_network_blocking_ctx(
        &self,
        network_name: &str,
        context: &mut Box<ExecutionContext>,
    ) -> Result<(), HostError> {
        let submitted = std::mem::replace(context, Box::new(ExecutionContext::new()));
        let (tx, rx) = mpsc::channel();
        self.run_network(
            network_name,
            submitted,
            Box::new(move |_, result, ctx| {
                let _ = tx.send((result, ctx));
            }),
            0,
        );
        let (result, returned) = rx
            .recv()
            .map_err(|_| HostError::Runtime("completion channel closed".into()))?;
        *context = returned;
        result
    }

    /// Shuts the executor down, removes every network, and stops every
    /// device. First device-stop error wins; the rest are logged.
    pub fn clear_host(&self) -> Result<(), HostError> {
        let executor = {
            let st = self.inner.state.read().expect("host state poisoned");
            Arc::clone(&st.executor)
        };
        executor.shutdown();
        debug_assert_eq!(
            self.inner.active_request_count.load(Ordering::SeqCst),
            0,
            "all requests should be finished when shutting down the host"
        );

        let names: Vec<String> = {
            let st = self.inner.state.read().expect("host state poisoned");
            st.networks.keys().cloned().collect()
        };
        for name in names {
            self.remove_network(&name)?;
        }

        let st = self.inner.state.write().expect("host state poisoned");
        let mut err = OneErr::new();
        for dm in st.devices.values() {
            err.set(dm.stop().map_err(Into::into));
        }
        self.inner.stats.set_counter(stats::DEVICE_MEMORY_USED, 0);
        self.inner
            .stats
            .set_counter(stats::DEVICE_MEMORY_AVAILABLE, 0);
        self.inner.stats.set_counter(stats::DEVICE_MEMORY_MAX, 0);
        err.into_result()
    }
}

impl Drop for HostManager {
    fn drop(&mut self) {
        if let Err(e) = self.clear_host() {
            tracing::warn!("clear_host during drop failed: {e}");
        }
    }
}

impl HostInner {
    /// Pops and dispatches the highest-priority request, or gives the
    /// concurrency slot back when the queue is empty.
    fn dispatch_next_run(inner: &Arc<HostInner>) {
        let request = {
            let mut queue = inner.infer_queue.lock().expect("infer queue poisoned");
            match queue.pop() {
                Some(request) => request,
                None => {
                    // Free the slot so new requests can launch.
                    inner.active_request_count.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            }
        };

        let (dag, executor) = {
            let st = inner.state.read().expect("host state poisoned");
            match st.networks.get(&request.network_name) {
                Some(network) => (Arc::clone(&network.dag), Arc::clone(&st.executor)),
                None => {
                    // Refcounts bar removal while queued; a miss here is a
                    // bookkeeping bug.
                    debug_assert!(false, "queued request for unregistered network");
                    drop(st);
                    (request.callback)(
                        request.request_id,
                        Err(HostError::NetNotFound(format!(
                            "function {} not found",
                            request.network_name
                        ))),
                        request.context,
                    );
                    Self::dispatch_next_run(inner);
                    return;
                }
            }
        };

        let inner_cb = Arc::clone(inner);
        let network_name = request.network_name;
        let user_callback = request.callback;
        let start_time = request.start_time;
        executor.run(
            dag,
            request.context,
            request.request_id,
            Box::new(move |run_id, result, mut ctx| {
                {
                    let st = inner_cb.state.read().expect("host state poisoned");
                    if let Some(network) = st.networks.get(&network_name) {
                        network.release();
                    }
                }
                let host_result = result.map_err(HostError::from);
                inner_cb.update_execution_stats(start_time, &network_name, &host_result);
                ctx.trace.stop_time = Some(Instant::now());
                user_callback(run_id, host_result, ctx);
                Self::dispatch_next_run(&inner_cb);
            }),
        );
    }

    /// Per-network and global counters for one finished request.
    fn update_execution_stats(
        &self,
        start_time: Instant,
        network_name: &str,
        result: &Result<(), HostError>,
    ) {
        let duration = start_time.elapsed();
        for scope in [network_name, "global"] {
            self.stats
                .add_time_series_value(&format!("execution_duration_e2e.{scope}"), duration);
            self.stats
                .increment_counter(&format!("requests_processed.{scope}"));
            let outcome = if result.is_err() {
                "requests_failed"
            } else {
                "requests_succeeded"
            };
            self.stats.increment_counter(&format!("{outcome}.{scope}"));
        }
    }

    fn export_memory_counters(&self) {
        let st = self.state.read().expect("host state poisoned");
        self.export_memory_counters_for(&st.devices);
    }

    /// Refreshes the device-memory counters from a device table (callable
    /// with the state lock held).
    fn export_memory_counters_for(&self, devices: &DeviceMap) {
        let mut max_memory = 0u64;
        let mut available = 0u64;
        for dm in devices.values() {
            max_memory += dm.maximum_memory();
            available += dm.available_memory();
        }
        self.stats
            .set_counter(stats::DEVICE_MEMORY_USED, max_memory - available);
        self.stats
            .set_counter(stats::DEVICE_MEMORY_AVAILABLE, available);
        self.stats.set_counter(stats::DEVICE_MEMORY_MAX, max_memory);
    }
}

/// Loads a flat `key = "value"` TOML options file.
fn load_options_file(path: &Path) -> Result<BTreeMap<String, String>, HostError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| HostError::Config(format!("backend options parse error: {e}")))
}
