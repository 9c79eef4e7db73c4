// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # host-rt
//!
//! Command-line interface for the accelerator host runtime.
//!
//! ## Usage
//! ```bash
//! # Run inference requests against a network manifest
//! host-rt run --network ./nets/resnet.json --name main --requests 8
//!
//! # Inspect how a network partitions across the devices
//! host-rt inspect --network ./nets/resnet.json
//!
//! # Show device inventory and memory counters
//! host-rt status --devices 4 --device-memory-mb 512
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "host-rt",
    about = "Heterogeneous accelerator host runtime",
    version,
    author
)]
struct Cli {
    /// Device-configs TOML file (replaces programmatic device configs).
    #[arg(long, global = true)]
    load_device_configs: Option<std::path::PathBuf>,

    /// Backend-specific options TOML merged at add-network time.
    #[arg(long, global = true)]
    load_backend_specific_opts: Option<std::path::PathBuf>,

    /// Enable cross-device direct transfers (bumps execution pools).
    #[arg(long = "enable-P2P", global = true)]
    enable_p2p: bool,

    /// Enable device-resident tensors (bumps execution pools).
    #[arg(long = "enable-DRT", global = true)]
    enable_drt: bool,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a network and submit inference requests to it.
    Run {
        /// Path to the network manifest (JSON).
        #[arg(short, long)]
        network: std::path::PathBuf,

        /// Function to run (defaults to the manifest's first function).
        #[arg(long)]
        name: Option<String>,

        /// Number of requests to submit.
        #[arg(long, default_value_t = 1)]
        requests: usize,

        /// Request priority (higher dispatches first).
        #[arg(long, default_value_t = 0)]
        priority: u64,

        /// Number of generated CPU devices when no configs file is given.
        #[arg(long, default_value_t = 1)]
        devices: usize,

        /// Memory per generated device, in MB.
        #[arg(long, default_value_t = 512)]
        device_memory_mb: u64,
    },

    /// Inspect how a network partitions across the device inventory.
    Inspect {
        /// Path to the network manifest (JSON).
        #[arg(short, long)]
        network: std::path::PathBuf,

        /// Number of generated CPU devices when no configs file is given.
        #[arg(long, default_value_t = 1)]
        devices: usize,

        /// Memory per generated device, in MB.
        #[arg(long, default_value_t = 512)]
        device_memory_mb: u64,
    },

    /// Display the device inventory and memory counters.
    Status {
        /// Number of generated CPU devices when no configs file is given.
        #[arg(long, default_value_t = 1)]
        devices: usize,

        /// Memory per generated device, in MB.
        #[arg(long, default_value_t = 512)]
        device_memory_mb: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    let options = host_runtime::HostOptions {
        load_backend_specific_opts: cli.load_backend_specific_opts,
        load_device_configs: cli.load_device_configs,
        enable_p2p: cli.enable_p2p,
        enable_drt: cli.enable_drt,
    };

    match cli.command {
        Commands::Run {
            network,
            name,
            requests,
            priority,
            devices,
            device_memory_mb,
        } => commands::run::execute(
            options,
            network,
            name,
            requests,
            priority,
            devices,
            device_memory_mb,
        ),
        Commands::Inspect {
            network,
            devices,
            device_memory_mb,
        } => commands::inspect::execute(options, network, devices, device_memory_mb),
        Commands::Status {
            devices,
            device_memory_mb,
        } => commands::status::execute(options, devices, device_memory_mb),
    }
}
