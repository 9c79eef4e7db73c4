// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `host-rt run` command: add a network and drive inference requests
//! through it.
//!
//! Inputs are synthesized from the function's declared input placeholders
//! (zero-filled tensors), which exercises the full admission, dispatch,
//! and device path without needing a dataset on hand.

use graph_ir::{CompilationContext, ExecutionContext, NetworkManifest};
use host_runtime::HostOptions;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;
use tensor_core::Tensor;

pub fn execute(
    options: HostOptions,
    network: PathBuf,
    name: Option<String>,
    requests: usize,
    priority: u64,
    devices: usize,
    device_memory_mb: u64,
) -> anyhow::Result<()> {
    let manifest = NetworkManifest::from_file(&network)
        .map_err(|e| anyhow::anyhow!("failed to load '{}': {e}", network.display()))?;
    let module = manifest.to_module()?;

    let target = match name {
        Some(name) => name,
        None => manifest
            .functions
            .first()
            .map(|f| f.name.clone())
            .ok_or_else(|| anyhow::anyhow!("manifest declares no functions"))?,
    };
    let input_specs: Vec<(String, tensor_core::Type)> = module
        .function(&target)
        .map(|f| {
            f.inputs
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect()
        })
        .ok_or_else(|| anyhow::anyhow!("function '{target}' not found in manifest"))?;

    let host = super::build_host(options, devices, device_memory_mb)?;
    host.add_network(module, CompilationContext::default())?;
    tracing::info!("network '{target}' added");

    let (tx, rx) = mpsc::channel();
    let submit_start = Instant::now();
    for _ in 0..requests {
        let mut ctx = Box::new(ExecutionContext::new());
        for (input, ty) in &input_specs {
            ctx.bindings.insert(input.clone(), Tensor::zeroed(ty.clone()));
        }
        let tx = tx.clone();
        host.run_network(
            &target,
            ctx,
            Box::new(move |run_id, result, ctx| {
                let _ = tx.send((run_id, result, ctx.trace.e2e_duration()));
            }),
            priority,
        );
    }
    drop(tx);

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for (run_id, result, latency) in rx.iter() {
        match result {
            Ok(()) => {
                succeeded += 1;
                if let Some(latency) = latency {
                    tracing::info!("run {run_id} ok in {:.2}ms", latency.as_secs_f64() * 1e3);
                }
            }
            Err(e) => {
                failed += 1;
                tracing::warn!("run {run_id} failed: {e}");
            }
        }
    }
    let elapsed = submit_start.elapsed();

    println!(
        "{requests} request(s) in {:.2}ms: {succeeded} succeeded, {failed} failed",
        elapsed.as_secs_f64() * 1e3,
    );
    println!(
        "processed={} succeeded={} failed={}",
        host.stats().counter(&format!("requests_processed.{target}")),
        host.stats().counter(&format!("requests_succeeded.{target}")),
        host.stats().counter(&format!("requests_failed.{target}")),
    );

    host.clear_host()?;
    Ok(())
}
