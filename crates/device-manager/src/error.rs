// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for device management.

/// Errors surfaced by a device manager.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device has not been initialized yet.
    #[error("device '{0}' is not initialized")]
    NotInitialized(String),

    /// The device has been stopped and accepts no further work.
    #[error("device '{0}' is stopped")]
    Stopped(String),

    /// A function with this name is already resident.
    #[error("function '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// No function with this name is resident.
    #[error("function '{0}' is not loaded on this device")]
    UnknownFunction(String),

    /// Loading would exceed the device memory budget.
    #[error("device out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: u64, available: u64 },

    /// A device-configs file could not be read.
    #[error("failed to read device configs: {0}")]
    ConfigReadError(#[from] std::io::Error),

    /// A device-configs file is malformed.
    #[error("failed to parse device configs: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    /// A config value is invalid.
    #[error("invalid device config: {0}")]
    InvalidConfig(String),

    /// The device worker thread could not be started or died.
    #[error("device '{0}' worker failed: {1}")]
    WorkerFailed(String, String),

    /// Execution inside the device failed.
    #[error(transparent)]
    Backend(#[from] backend_core::BackendError),
}
