// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared CLI plumbing.

pub mod inspect;
pub mod run;
pub mod status;

use device_manager::{generate_device_configs, DeviceConfig};
use host_runtime::{HostManager, HostOptions};

/// Initializes tracing based on `-v` count (overridable via `RUST_LOG`).
pub fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Builds a host from the CLI's device flags.
///
/// When `--load-device-configs` was given, the file wins; otherwise
/// `devices` uniform CPU devices are generated.
pub fn build_host(
    options: HostOptions,
    devices: usize,
    device_memory_mb: u64,
) -> anyhow::Result<HostManager> {
    let configs: Vec<DeviceConfig> =
        generate_device_configs(devices, "cpu", device_memory_mb * 1024 * 1024);
    HostManager::new(configs, host_runtime::HostConfig::default(), options)
        .map_err(|e| anyhow::anyhow!("failed to bring up host: {e}"))
}
