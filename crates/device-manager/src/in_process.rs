// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The in-process reference device.
//!
//! Simulates one accelerator with a dedicated worker thread fed by a
//! command channel. Loads are accounted against the configured device
//! memory; a load that would exceed the budget fails before any state
//! changes, so there is never partial residency to roll back.

use crate::manager::{device_info_from_config, DeviceInfo, RunCallback};
use crate::{DeviceConfig, DeviceError, DeviceId, DeviceManager};
use backend_core::CompiledFunction;
use crossbeam_channel::{unbounded, Sender};
use graph_ir::ExecutionContext;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

enum Command {
    Run {
        name: String,
        ctx: Box<ExecutionContext>,
        done: RunCallback,
    },
    Stop,
}

struct LoadedFunction {
    artifact: Arc<dyn CompiledFunction>,
    size: u64,
}

struct DeviceInner {
    name: String,
    functions: Mutex<HashMap<String, Arc<LoadedFunction>>>,
    used_memory: AtomicU64,
    trace_active: AtomicBool,
    trace_events: Mutex<Vec<String>>,
}

#[derive(Default)]
struct WorkerState {
    tx: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
}

/// One simulated accelerator device.
pub struct InProcessDeviceManager {
    id: DeviceId,
    config: DeviceConfig,
    inner: Arc<DeviceInner>,
    worker: Mutex<WorkerState>,
}

impl InProcessDeviceManager {
    /// Creates a device from its config. `init` must run before use.
    pub fn new(id: DeviceId, config: DeviceConfig) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("config{id}"));
        Self {
            id,
            config,
            inner: Arc::new(DeviceInner {
                name,
                functions: Mutex::new(HashMap::new()),
                used_memory: AtomicU64::new(0),
                trace_active: AtomicBool::new(false),
                trace_events: Mutex::new(Vec::new()),
            }),
            worker: Mutex::new(WorkerState::default()),
        }
    }

    /// Trace events recorded since the last `start_device_trace`.
    pub fn trace_events(&self) -> Vec<String> {
        self.inner
            .trace_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn worker_loop(inner: Arc<DeviceInner>, rx: crossbeam_channel::Receiver<Command>) {
        for command in rx.iter() {
            match command {
                Command::Run {
                    name,
                    mut ctx,
                    done,
                } => {
                    let function = inner
                        .functions
                        .lock()
                        .expect("device function table poisoned")
                        .get(&name)
                        .cloned();
                    match function {
                        None => done(Err(DeviceError::UnknownFunction(name)), ctx),
                        Some(loaded) => {
                            if inner.trace_active.load(Ordering::Acquire) {
                                if let Ok(mut events) = inner.trace_events.lock() {
                                    events.push(format!("{}:run:{}", inner.name, name));
                                }
                            }
                            let result = loaded
                                .artifact
                                .execute(&mut ctx)
                                .map_err(DeviceError::from);
                            done(result, ctx);
                        }
                    }
                }
                Command::Stop => break,
            }
        }
    }
}

impl DeviceManager for InProcessDeviceManager {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn backend_name(&self) -> &str {
        &self.config.backend_name
    }

    fn init(&self) -> Result<(), DeviceError> {
        let mut worker = self
            .worker
            .lock()
            .expect("device worker state poisoned");
        if worker.tx.is_some() {
            return Ok(());
        }
        let (tx, rx) = unbounded();
        let inner = Arc::clone(&self.inner);
        let handle = std::thread::Builder::new()
            .name(format!("device-{}", self.inner.name))
            .spawn(move || Self::worker_loop(inner, rx))
            .map_err(|e| {
                DeviceError::WorkerFailed(self.inner.name.clone(), e.to_string())
            })?;
        worker.tx = Some(tx);
        worker.handle = Some(handle);
        tracing::info!(
            "device '{}' up: backend '{}', {} bytes",
            self.inner.name,
            self.config.backend_name,
            self.config.device_memory,
        );
        Ok(())
    }

    fn stop(&self) -> Result<(), DeviceError> {
        let (tx, handle) = {
            let mut worker = self
                .worker
                .lock()
                .expect("device worker state poisoned");
            (worker.tx.take(), worker.handle.take())
        };
        let Some(tx) = tx else {
            // Never started, or already stopped.
            return Ok(());
        };
        // Queued runs drain before the stop command is reached.
        let _ = tx.send(Command::Stop);
        drop(tx);
        if let Some(handle) = handle {
            handle.join().map_err(|_| {
                DeviceError::WorkerFailed(self.inner.name.clone(), "worker panicked".into())
            })?;
        }
        tracing::info!("device '{}' stopped", self.inner.name);
        Ok(())
    }

    fn maximum_memory(&self) -> u64 {
        self.config.device_memory
    }

    fn available_memory(&self) -> u64 {
        self.config
            .device_memory
            .saturating_sub(self.inner.used_memory.load(Ordering::Acquire))
    }

    fn param_by_name(&self, name: &str) -> Option<String> {
        self.config.parameters.get(name).cloned()
    }

    fn device_info(&self) -> DeviceInfo {
        device_info_from_config(self.id, &self.config, self.available_memory())
    }

    fn load_function(
        &self,
        name: &str,
        function: Box<dyn CompiledFunction>,
        size: u64,
    ) -> Result<(), DeviceError> {
        let mut functions = self
            .inner
            .functions
            .lock()
            .expect("device function table poisoned");
        if functions.contains_key(name) {
            return Err(DeviceError::AlreadyLoaded(name.to_string()));
        }
        let available = self.available_memory();
        if size > available {
            return Err(DeviceError::OutOfMemory {
                requested: size,
                available,
            });
        }
        functions.insert(
            name.to_string(),
            Arc::new(LoadedFunction {
                artifact: Arc::from(function),
                size,
            }),
        );
        self.inner.used_memory.fetch_add(size, Ordering::Release);
        tracing::debug!("device '{}': loaded '{name}' ({size} bytes)", self.inner.name);
        Ok(())
    }

    fn evict_function(&self, name: &str) -> Result<(), DeviceError> {
        let removed = self
            .inner
            .functions
            .lock()
            .expect("device function table poisoned")
            .remove(name);
        match removed {
            Some(loaded) => {
                self.inner
                    .used_memory
                    .fetch_sub(loaded.size, Ordering::Release);
                tracing::debug!("device '{}': evicted '{name}'", self.inner.name);
                Ok(())
            }
            None => Err(DeviceError::UnknownFunction(name.to_string())),
        }
    }

    fn run_function(&self, name: &str, ctx: Box<ExecutionContext>, done: RunCallback) {
        let tx = {
            let worker = self
                .worker
                .lock()
                .expect("device worker state poisoned");
            worker.tx.clone()
        };
        let Some(tx) = tx else {
            done(Err(DeviceError::NotInitialized(self.inner.name.clone())), ctx);
            return;
        };
        let command = Command::Run {
            name: name.to_string(),
            ctx,
            done,
        };
        if let Err(send_error) = tx.send(command) {
            if let Command::Run { ctx, done, .. } = send_error.0 {
                done(Err(DeviceError::Stopped(self.inner.name.clone())), ctx);
            }
        }
    }

    fn start_device_trace(&self) -> Result<(), DeviceError> {
        if let Ok(mut events) = self.inner.trace_events.lock() {
            events.clear();
        }
        self.inner.trace_active.store(true, Ordering::Release);
        Ok(())
    }

    fn stop_device_trace(&self) -> Result<(), DeviceError> {
        self.inner.trace_active.store(false, Ordering::Release);
        Ok(())
    }
}

impl Drop for InProcessDeviceManager {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_core::{Backend, CpuBackend};
    use graph_ir::{BackendOptions, Function, Placeholder};
    use std::sync::mpsc;
    use tensor_core::{ElemKind, Shape, Tensor, Type};

    fn compiled(name: &str) -> Box<dyn CompiledFunction> {
        let function = Function {
            name: name.into(),
            inputs: vec![Placeholder {
                name: "in".into(),
                ty: Type::new(ElemKind::Float, Shape::vector(2)),
            }],
            outputs: vec![Placeholder {
                name: "out".into(),
                ty: Type::new(ElemKind::Float, Shape::vector(2)),
            }],
            output_nodes: vec![],
            nodes: vec![],
        };
        CpuBackend
            .compile(&function, &BackendOptions::default())
            .unwrap()
    }

    fn device(memory: u64) -> InProcessDeviceManager {
        let dm = InProcessDeviceManager::new(0, DeviceConfig::new("cpu", memory).with_name("dev0"));
        dm.init().unwrap();
        dm
    }

    #[test]
    fn test_memory_accounting() {
        let dm = device(1000);
        assert_eq!(dm.available_memory(), 1000);

        dm.load_function("f", compiled("f"), 400).unwrap();
        assert_eq!(dm.available_memory(), 600);

        dm.evict_function("f").unwrap();
        assert_eq!(dm.available_memory(), 1000);
    }

    #[test]
    fn test_load_over_budget_fails_cleanly() {
        let dm = device(100);
        let err = dm.load_function("f", compiled("f"), 200).unwrap_err();
        assert!(matches!(err, DeviceError::OutOfMemory { .. }));
        // Nothing became resident.
        assert_eq!(dm.available_memory(), 100);
        assert!(matches!(
            dm.evict_function("f"),
            Err(DeviceError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_duplicate_load_rejected() {
        let dm = device(1000);
        dm.load_function("f", compiled("f"), 100).unwrap();
        assert!(matches!(
            dm.load_function("f", compiled("f"), 100),
            Err(DeviceError::AlreadyLoaded(_))
        ));
    }

    #[test]
    fn test_run_function_completes() {
        let dm = device(1000);
        dm.load_function("f", compiled("f"), 100).unwrap();

        let mut ctx = Box::new(ExecutionContext::new());
        ctx.bindings
            .insert("in", Tensor::from_f32(Shape::vector(2), &[1.0, 2.0]).unwrap());

        let (tx, rx) = mpsc::channel();
        dm.run_function(
            "f",
            ctx,
            Box::new(move |result, ctx| {
                tx.send((result.is_ok(), ctx)).unwrap();
            }),
        );
        let (ok, ctx) = rx.recv().unwrap();
        assert!(ok);
        assert!(ctx.bindings.get("out").is_some());
    }

    #[test]
    fn test_run_unknown_function() {
        let dm = device(1000);
        let (tx, rx) = mpsc::channel();
        dm.run_function(
            "ghost",
            Box::new(ExecutionContext::new()),
            Box::new(move |result, _| {
                tx.send(result).unwrap();
            }),
        );
        assert!(matches!(
            rx.recv().unwrap(),
            Err(DeviceError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_run_before_init() {
        let dm =
            InProcessDeviceManager::new(0, DeviceConfig::new("cpu", 100).with_name("cold"));
        let (tx, rx) = mpsc::channel();
        dm.run_function(
            "f",
            Box::new(ExecutionContext::new()),
            Box::new(move |result, _| {
                tx.send(result).unwrap();
            }),
        );
        assert!(matches!(
            rx.recv().unwrap(),
            Err(DeviceError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dm = device(1000);
        dm.stop().unwrap();
        dm.stop().unwrap();
    }

    #[test]
    fn test_trace_records_runs() {
        let dm = device(1000);
        dm.load_function("f", compiled("f"), 100).unwrap();
        dm.start_device_trace().unwrap();

        let mut ctx = Box::new(ExecutionContext::new());
        ctx.bindings
            .insert("in", Tensor::from_f32(Shape::vector(2), &[0.0, 0.0]).unwrap());
        let (tx, rx) = mpsc::channel();
        dm.run_function(
            "f",
            ctx,
            Box::new(move |_, _| {
                tx.send(()).unwrap();
            }),
        );
        rx.recv().unwrap();
        dm.stop_device_trace().unwrap();

        let events = dm.trace_events();
        assert_eq!(events, vec!["dev0:run:f".to_string()]);
    }

    #[test]
    fn test_auto_assigned_name() {
        let dm = InProcessDeviceManager::new(7, DeviceConfig::new("cpu", 100));
        assert_eq!(dm.name(), "config7");
    }
}
