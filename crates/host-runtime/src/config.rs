// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host configuration.
//!
//! # TOML Format
//! ```toml
//! executor_threads = 3
//! max_active_requests = 48
//! max_queue_size = 100
//! ```

use crate::HostError;
use std::path::{Path, PathBuf};

/// Sizing knobs for the host. Immutable after construction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HostConfig {
    /// Worker threads in the executor.
    #[serde(default = "default_executor_threads")]
    pub executor_threads: usize,
    /// Requests allowed in flight at once.
    #[serde(default = "default_max_active_requests")]
    pub max_active_requests: usize,
    /// Requests allowed to wait in the admission queue.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

fn default_executor_threads() -> usize {
    3
}

fn default_max_active_requests() -> usize {
    48
}

fn default_max_queue_size() -> usize {
    100
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            executor_threads: default_executor_threads(),
            max_active_requests: default_max_active_requests(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl HostConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, HostError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, HostError> {
        toml::from_str(toml_str)
            .map_err(|e| HostError::Config(format!("TOML parse error: {e}")))
    }
}

/// Process-level option values, normally populated from CLI flags.
///
/// These override per-call settings: an options file given here beats any
/// `backend_specific_opts` a caller attaches to its compilation context.
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    /// Backend-specific options file merged at `add_network` time.
    pub load_backend_specific_opts: Option<PathBuf>,
    /// Device-configs file replacing programmatic configs.
    pub load_device_configs: Option<PathBuf>,
    /// Cross-device direct transfers; bumps execution pool sizes.
    pub enable_p2p: bool,
    /// Device-resident tensors; bumps execution pool sizes.
    pub enable_drt: bool,
}
