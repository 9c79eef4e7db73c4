// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `host-rt inspect` command: show how a network partitions across the
//! device inventory.

use graph_ir::{CompilationContext, NetworkManifest};
use host_runtime::HostOptions;
use std::path::PathBuf;

pub fn execute(
    options: HostOptions,
    network: PathBuf,
    devices: usize,
    device_memory_mb: u64,
) -> anyhow::Result<()> {
    let manifest = NetworkManifest::from_file(&network)
        .map_err(|e| anyhow::anyhow!("failed to load '{}': {e}", network.display()))?;
    let module = manifest.to_module()?;
    let function_names: Vec<String> =
        module.functions().iter().map(|f| f.name.clone()).collect();

    let host = super::build_host(options, devices, device_memory_mb)?;
    host.add_network(module, CompilationContext::default())?;

    println!("Network: {}", manifest.name);
    for name in &function_names {
        let dag = host.get_network_dag(name)?;
        println!("  {}", dag.summary());
        println!(
            "  {:<24} {:<12} {:>12} {:>10} {:<16}",
            "Partition", "Backend", "Est. bytes", "Devices", "Outputs",
        );
        println!("  {}", "-".repeat(78));
        for node in dag.nodes() {
            let devices: Vec<String> = node
                .device_runtime_infos
                .iter()
                .map(|d| d.to_string())
                .collect();
            println!(
                "  {:<24} {:<12} {:>12} {:>10} {:<16}",
                node.name,
                node.backend_name,
                node.size,
                devices.join(","),
                node.outputs.join(","),
            );
        }
        println!();
    }

    host.clear_host()?;
    Ok(())
}
