// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device-manager contract.
//!
//! One [`DeviceManager`] owns one accelerator. The runtime demands:
//! initialization and teardown, memory reporting, function load/evict (both
//! treated as blocking; a failed load must leave no partial state), request
//! execution with a completion callback that may fire on any thread, and a
//! per-device trace sink.

use crate::{DeviceConfig, DeviceError};
use backend_core::CompiledFunction;
use graph_ir::ExecutionContext;
use std::collections::BTreeMap;

/// Dense device identifier assigned by the host at init.
pub type DeviceId = usize;

/// Completion callback for [`DeviceManager::run_function`].
pub type RunCallback = Box<dyn FnOnce(Result<(), DeviceError>, Box<ExecutionContext>) + Send>;

/// A point-in-time snapshot of one device, handed to the partitioner.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: DeviceId,
    pub backend_name: String,
    pub available_memory: u64,
    pub maximum_memory: u64,
    /// Node-kind hints from device parameters (comma-separated labels).
    pub supported_nodes: Vec<String>,
    pub non_supported_nodes: Vec<String>,
}

/// Owner of one accelerator device.
pub trait DeviceManager: Send + Sync {
    /// Dense identifier assigned by the host.
    fn id(&self) -> DeviceId;

    /// Configured device name.
    fn name(&self) -> &str;

    /// Backend driving this device.
    fn backend_name(&self) -> &str;

    /// Brings the device up. Must be called before any other operation.
    fn init(&self) -> Result<(), DeviceError>;

    /// Drains in-flight work and shuts the device down.
    fn stop(&self) -> Result<(), DeviceError>;

    /// Total device memory in bytes.
    fn maximum_memory(&self) -> u64;

    /// Memory not yet claimed by resident functions, in bytes.
    fn available_memory(&self) -> u64;

    /// Looks up a named config parameter.
    fn param_by_name(&self, name: &str) -> Option<String>;

    /// Snapshot for the partitioner.
    fn device_info(&self) -> DeviceInfo;

    /// Makes a compiled function resident.
    ///
    /// Blocking from the caller's perspective. On failure the device state
    /// is unchanged.
    fn load_function(
        &self,
        name: &str,
        function: Box<dyn CompiledFunction>,
        size: u64,
    ) -> Result<(), DeviceError>;

    /// Removes a resident function.
    fn evict_function(&self, name: &str) -> Result<(), DeviceError>;

    /// Executes a resident function against `ctx`.
    ///
    /// Non-blocking: `done` fires exactly once, on an arbitrary thread,
    /// with the context handed back.
    fn run_function(&self, name: &str, ctx: Box<ExecutionContext>, done: RunCallback);

    /// Starts routing execution events into the device trace sink.
    fn start_device_trace(&self) -> Result<(), DeviceError>;

    /// Stops the device trace sink.
    fn stop_device_trace(&self) -> Result<(), DeviceError>;
}

/// Splits a comma-separated node-hint parameter into labels.
pub(crate) fn split_node_hints(param: Option<String>) -> Vec<String> {
    param
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Builds a [`DeviceInfo`] from a config and live memory numbers.
pub(crate) fn device_info_from_config(
    id: DeviceId,
    config: &DeviceConfig,
    available_memory: u64,
) -> DeviceInfo {
    DeviceInfo {
        device_id: id,
        backend_name: config.backend_name.clone(),
        available_memory,
        maximum_memory: config.device_memory,
        supported_nodes: split_node_hints(config.parameters.get("supportedNodes").cloned()),
        non_supported_nodes: split_node_hints(
            config.parameters.get("nonSupportedNodes").cloned(),
        ),
    }
}

/// Convenience alias for the host's device table.
pub type DeviceMap = BTreeMap<DeviceId, std::sync::Arc<dyn DeviceManager>>;
