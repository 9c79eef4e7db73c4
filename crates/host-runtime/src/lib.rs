// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # host-runtime
//!
//! The host side of the accelerator runtime: accepts compiled modules,
//! provisions them onto a fleet of devices, and dispatches inference
//! requests with bounded concurrency and admission control.
//!
//! The public surface is the [`HostManager`]:
//!
//! ```no_run
//! use device_manager::DeviceConfig;
//! use graph_ir::{CompilationContext, ExecutionContext, NetworkManifest};
//! use host_runtime::HostManager;
//!
//! # fn main() -> Result<(), host_runtime::HostError> {
//! let host = HostManager::with_defaults(vec![DeviceConfig::new("cpu", 512 << 20)])?;
//!
//! let module = NetworkManifest::from_file("net.json".as_ref())?.to_module()?;
//! host.add_network(module, CompilationContext::default())?;
//!
//! host.run_network(
//!     "main",
//!     Box::new(ExecutionContext::new()),
//!     Box::new(|run_id, result, _ctx| {
//!         println!("run {run_id}: {result:?}");
//!     }),
//!     /* priority */ 1,
//! );
//! # Ok(())
//! # }
//! ```
//!
//! Internals: [`Provisioner`] owns partition residency, the executor (in
//! its own crate) traverses DAGs, and [`StatsRegistry`] is the counter
//! surface the host exports its health through.

mod config;
#[cfg(feature = "dag-optimizer")]
mod dag_opt;
mod error;
mod manager;
mod network;
mod provisioner;
mod request;
mod serialize;
pub mod stats;

pub use config::{HostConfig, HostOptions};
pub use error::{ErrorCode, HostError, OneErr};
pub use manager::HostManager;
pub use provisioner::Provisioner;
pub use request::{ResultCallback, RunIdentifier};
pub use serialize::write_dag_artifact;
pub use stats::StatsRegistry;
