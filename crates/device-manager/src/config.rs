// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device configuration, loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! [[devices]]
//! backend = "cpu"
//! name = "cpu0"
//! memory_mb = 512
//!
//! [devices.parameters]
//! supportedNodes = "add,mul,mat_mul"
//! ```

use crate::DeviceError;
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration for one accelerator device.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeviceConfig {
    /// Backend that compiles for and drives this device.
    pub backend_name: String,
    /// Device name. When absent, the host assigns `"config<N>"` at init.
    pub name: Option<String>,
    /// Opaque backend parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Device memory in bytes.
    pub device_memory: u64,
}

impl DeviceConfig {
    /// Creates a config for `backend_name` with the given memory budget.
    pub fn new(backend_name: impl Into<String>, device_memory: u64) -> Self {
        Self {
            backend_name: backend_name.into(),
            name: None,
            parameters: BTreeMap::new(),
            device_memory,
        }
    }

    /// Sets the device name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a backend parameter.
    pub fn with_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns `true` when an explicit name was configured.
    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }
}

#[derive(Debug, serde::Deserialize)]
struct DeviceConfigEntry {
    backend: String,
    #[serde(default)]
    name: Option<String>,
    memory_mb: u64,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

#[derive(Debug, serde::Deserialize)]
struct DeviceConfigsFile {
    devices: Vec<DeviceConfigEntry>,
}

/// Loads device configs from a TOML file.
pub fn load_device_configs_from_file(path: &Path) -> Result<Vec<DeviceConfig>, DeviceError> {
    let content = std::fs::read_to_string(path)?;
    load_device_configs_from_toml(&content)
}

/// Parses device configs from a TOML string.
pub fn load_device_configs_from_toml(toml_str: &str) -> Result<Vec<DeviceConfig>, DeviceError> {
    let file: DeviceConfigsFile = toml::from_str(toml_str)?;
    if file.devices.is_empty() {
        return Err(DeviceError::InvalidConfig(
            "device configs file declares no devices".into(),
        ));
    }
    Ok(file
        .devices
        .into_iter()
        .map(|entry| DeviceConfig {
            backend_name: entry.backend,
            name: entry.name,
            parameters: entry.parameters,
            device_memory: entry.memory_mb * 1024 * 1024,
        })
        .collect())
}

/// Generates `count` uniform device configs for `backend_name`.
///
/// The programmatic fallback when no configs file is given.
pub fn generate_device_configs(
    count: usize,
    backend_name: &str,
    device_memory: u64,
) -> Vec<DeviceConfig> {
    (0..count)
        .map(|_| DeviceConfig::new(backend_name, device_memory))
        .collect()
}

/// Parses multi-line `"key" : "value"` parameter blocks into a map.
///
/// This is the wire format some frontends embed device parameters in; each
/// line carries exactly one quoted key and one quoted value.
pub fn parse_backend_params(block: &str) -> Result<BTreeMap<String, String>, DeviceError> {
    let mut params = BTreeMap::new();
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut quoted = line.split('"');
        // Fields: before-key, key, between, value, after.
        let (key, value) = match (
            quoted.next(),
            quoted.next(),
            quoted.next(),
            quoted.next(),
        ) {
            (Some(_), Some(key), Some(_), Some(value)) => (key, value),
            _ => {
                return Err(DeviceError::InvalidConfig(format!(
                    "malformed parameter line '{line}'"
                )))
            }
        };
        params.insert(key.to_string(), value.to_string());
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = DeviceConfig::new("cpu", 1024)
            .with_name("cpu0")
            .with_parameter("supportedNodes", "add,mul");
        assert!(config.has_name());
        assert_eq!(config.backend_name, "cpu");
        assert_eq!(config.parameters["supportedNodes"], "add,mul");
    }

    #[test]
    fn test_generate_configs() {
        let configs = generate_device_configs(3, "cpu", 4096);
        assert_eq!(configs.len(), 3);
        assert!(configs.iter().all(|c| !c.has_name()));
        assert!(configs.iter().all(|c| c.device_memory == 4096));
    }

    #[test]
    fn test_load_from_toml() {
        let toml_str = r#"
[[devices]]
backend = "cpu"
name = "cpu0"
memory_mb = 512

[devices.parameters]
supportedNodes = "add,mul"

[[devices]]
backend = "cpu"
memory_mb = 256
"#;
        let configs = load_device_configs_from_toml(toml_str).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name.as_deref(), Some("cpu0"));
        assert_eq!(configs[0].device_memory, 512 * 1024 * 1024);
        assert!(!configs[1].has_name());
    }

    #[test]
    fn test_load_empty_file_rejected() {
        assert!(load_device_configs_from_toml("devices = []").is_err());
    }

    #[test]
    fn test_parse_backend_params() {
        let block = "\"numThreads\" : \"4\"\n\"useJIT\" : \"true\"\n";
        let params = parse_backend_params(block).unwrap();
        assert_eq!(params["numThreads"], "4");
        assert_eq!(params["useJIT"], "true");
    }

    #[test]
    fn test_parse_backend_params_malformed() {
        assert!(parse_backend_params("numThreads = 4").is_err());
    }
}
