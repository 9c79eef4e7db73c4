// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Placement of compiled partitions onto devices.
//!
//! The provisioner owns the mapping from loaded function names to the
//! devices holding them, plus a cache of backend handles. It keeps no
//! per-request state: everything here is about residency.
//!
//! `provision` is transactional per DAG: any failure evicts whatever this
//! call already loaded before the error is returned.

use crate::{HostError, OneErr};
use backend_core::{create_backend, Backend};
use device_manager::{DeviceId, DeviceManager, DeviceMap};
use graph_ir::{CompilationContext, Module};
use partitioner::Dag;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Compiles partitions and manages their residency across devices.
pub struct Provisioner {
    devices: DeviceMap,
    backends: Mutex<BTreeMap<String, Arc<dyn Backend>>>,
    /// Function name to the devices currently holding it.
    residency: Mutex<BTreeMap<String, Vec<DeviceId>>>,
}

impl Provisioner {
    /// Creates a provisioner over the host's device table.
    pub fn new(devices: DeviceMap) -> Self {
        Self {
            devices,
            backends: Mutex::new(BTreeMap::new()),
            residency: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns (lazily constructing) the backend registered under `name`.
    pub fn get_backend(&self, name: &str) -> Result<Arc<dyn Backend>, HostError> {
        let mut backends = self.backends.lock().expect("backend cache poisoned");
        if let Some(backend) = backends.get(name) {
            return Ok(Arc::clone(backend));
        }
        let backend = create_backend(name)?;
        backends.insert(name.to_string(), Arc::clone(&backend));
        Ok(backend)
    }

    /// Compiles every partition of `dag` and loads it onto a device of its
    /// backend with the most free memory, recording the placement on the
    /// node. On failure, everything loaded by this call is evicted and a
    /// single aggregated error returns.
    pub fn provision(
        &self,
        dag: &mut Dag,
        module: &Module,
        cctx: &CompilationContext,
    ) -> Result<(), HostError> {
        let mut loaded: Vec<(String, DeviceId)> = Vec::new();

        let result = (|| -> Result<(), HostError> {
            for idx in 0..dag.len() {
                let (name, backend_name, size, replicas) = {
                    let node = &dag.nodes()[idx];
                    (
                        node.name.clone(),
                        node.backend_name.clone(),
                        node.size,
                        node.logical_devices.max(1),
                    )
                };
                let function = module.function(&name).ok_or_else(|| {
                    HostError::Runtime(format!("function '{name}' not found in module"))
                })?;
                let backend = self.get_backend(&backend_name)?;

                for _ in 0..replicas {
                    let device_id = self.pick_device(&backend_name, size, &name)?;
                    let compiled = backend.compile(function, &cctx.backend_opts)?;
                    let dm = self
                        .devices
                        .get(&device_id)
                        .expect("picked device disappeared");
                    dm.load_function(&name, compiled, size)?;
                    loaded.push((name.clone(), device_id));
                    self.residency
                        .lock()
                        .expect("residency table poisoned")
                        .entry(name.clone())
                        .or_default()
                        .push(device_id);
                    dag.nodes_mut()[idx].device_runtime_infos.push(device_id);
                }
            }
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!("provisioning '{}' failed, rolling back: {e}", dag.root_name());
            for (name, device_id) in loaded {
                if let Err(evict_err) = self.evict_function(&name, device_id) {
                    tracing::warn!("rollback eviction of '{name}' failed: {evict_err}");
                }
            }
            for node in dag.nodes_mut() {
                node.device_runtime_infos.clear();
            }
            return Err(e);
        }
        Ok(())
    }

    /// Evicts every partition of `dag` (used when a multi-DAG add fails
    /// after earlier DAGs were provisioned).
    pub fn unprovision(&self, dag: &mut Dag) {
        for node in dag.nodes_mut() {
            for device_id in std::mem::take(&mut node.device_runtime_infos) {
                if let Err(e) = self.evict_function(&node.name, device_id) {
                    tracing::warn!("unprovision of '{}' failed: {e}", node.name);
                }
            }
        }
    }

    /// Evicts one function from one device.
    pub fn evict_function(&self, name: &str, device_id: DeviceId) -> Result<(), HostError> {
        let dm = self.devices.get(&device_id).ok_or_else(|| {
            HostError::Runtime(format!("unknown device {device_id} for eviction"))
        })?;
        dm.evict_function(name)?;
        let mut residency = self.residency.lock().expect("residency table poisoned");
        if let Some(devices) = residency.get_mut(name) {
            devices.retain(|&d| d != device_id);
            if devices.is_empty() {
                residency.remove(name);
            }
        }
        Ok(())
    }

    /// Drops a function everywhere it is still resident. A name with no
    /// residency is a no-op.
    pub fn remove_function(&self, name: &str) -> Result<(), HostError> {
        let devices = self
            .residency
            .lock()
            .expect("residency table poisoned")
            .remove(name);
        let mut err = OneErr::new();
        if let Some(devices) = devices {
            for device_id in devices {
                match self.devices.get(&device_id) {
                    Some(dm) => err.set(dm.evict_function(name).map_err(Into::into)),
                    None => err.set(Err(HostError::Runtime(format!(
                        "unknown device {device_id} while removing '{name}'"
                    )))),
                }
            }
        }
        err.into_result()
    }

    /// The device of `backend_name` with the most free memory that fits
    /// `size`.
    fn pick_device(
        &self,
        backend_name: &str,
        size: u64,
        function: &str,
    ) -> Result<DeviceId, HostError> {
        let best = self
            .devices
            .iter()
            .filter(|(_, dm)| dm.backend_name() == backend_name)
            .map(|(&id, dm)| (id, dm.available_memory()))
            .max_by_key(|&(_, available)| available);
        match best {
            Some((id, available)) if available >= size => Ok(id),
            Some((_, available)) => Err(HostError::Runtime(format!(
                "no '{backend_name}' device fits '{function}': needs {size} bytes, \
                 best offers {available}"
            ))),
            None => Err(HostError::Runtime(format!(
                "no device with backend '{backend_name}' for '{function}'"
            ))),
        }
    }
}
