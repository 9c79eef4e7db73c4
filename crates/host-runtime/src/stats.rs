// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The counter interface the host exports its health through.
//!
//! Deliberately minimal: named monotonic/settable counters plus duration
//! series. Anything fancier (export formats, sinks) sits outside the
//! runtime.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Counter: bytes of device memory claimed by resident functions.
pub const DEVICE_MEMORY_USED: &str = "device_memory_used";
/// Counter: bytes of device memory still free.
pub const DEVICE_MEMORY_AVAILABLE: &str = "device_memory_available";
/// Counter: total bytes of device memory.
pub const DEVICE_MEMORY_MAX: &str = "device_memory_max";

/// Named counters and duration series.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    counters: Mutex<BTreeMap<String, u64>>,
    durations: Mutex<BTreeMap<String, Vec<Duration>>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a counter to an absolute value.
    pub fn set_counter(&self, key: &str, value: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.insert(key.to_string(), value);
        }
    }

    /// Adds one to a counter.
    pub fn increment_counter(&self, key: &str) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(key.to_string()).or_insert(0) += 1;
        }
    }

    /// Reads a counter (0 when never set).
    pub fn counter(&self, key: &str) -> u64 {
        self.counters
            .lock()
            .map(|counters| counters.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Appends one sample to a duration series.
    pub fn add_time_series_value(&self, key: &str, value: Duration) {
        if let Ok(mut durations) = self.durations.lock() {
            durations.entry(key.to_string()).or_default().push(value);
        }
    }

    /// Number of samples recorded under `key`.
    pub fn time_series_len(&self, key: &str) -> usize {
        self.durations
            .lock()
            .map(|durations| durations.get(key).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// A point-in-time copy of every counter.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .lock()
            .map(|counters| counters.clone())
            .unwrap_or_default()
    }
}
