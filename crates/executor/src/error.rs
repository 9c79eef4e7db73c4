// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for DAG execution.

use device_manager::DeviceId;

/// Errors surfaced through a run's completion callback.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The executor is shutting down and accepts no new runs.
    #[error("executor is shutting down")]
    ShuttingDown,

    /// No execution-state pool exists for this network.
    #[error("no execution pool for network '{0}'")]
    UnknownNetwork(String),

    /// A partition was never provisioned onto any device.
    #[error("partition '{0}' has no device assignment")]
    NoDeviceAssigned(String),

    /// A partition references a device the executor does not know.
    #[error("partition '{node}' assigned to unknown device {device}")]
    DeviceMissing { node: String, device: DeviceId },

    /// A device failed while running a partition.
    #[error(transparent)]
    Device(#[from] device_manager::DeviceError),
}
