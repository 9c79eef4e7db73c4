// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `host-rt status` command: device inventory and memory counters.

use host_runtime::{stats, HostOptions};

pub fn execute(
    options: HostOptions,
    devices: usize,
    device_memory_mb: u64,
) -> anyhow::Result<()> {
    let host = super::build_host(options, devices, device_memory_mb)?;
    let snapshot = host.stats().snapshot();

    println!("Host status");
    println!(
        "  max active requests: {}",
        host.config().max_active_requests
    );
    println!("  max queue size:      {}", host.config().max_queue_size);
    println!("  executor threads:    {}", host.config().executor_threads);
    println!();
    println!("Device memory");
    println!(
        "  total:     {} bytes",
        snapshot.get(stats::DEVICE_MEMORY_MAX).copied().unwrap_or(0)
    );
    println!(
        "  available: {} bytes",
        snapshot
            .get(stats::DEVICE_MEMORY_AVAILABLE)
            .copied()
            .unwrap_or(0)
    );
    println!(
        "  used:      {} bytes",
        snapshot
            .get(stats::DEVICE_MEMORY_USED)
            .copied()
            .unwrap_or(0)
    );

    host.clear_host()?;
    Ok(())
}
