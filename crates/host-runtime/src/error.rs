// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host-level errors, their wire codes, and the first-error-wins
//! aggregation used by teardown paths.

/// The stable code a [`HostError`] surfaces to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Structural failure (duplicate network name, profile preconditions).
    Runtime,
    /// `run_network` against an unknown name.
    NetNotFound,
    /// `remove_network` while the network is being added or has in-flight
    /// requests.
    NetBusy,
    /// The admission queue is full.
    RequestRefused,
    /// A device primitive failed.
    Device,
    /// The partitioner rejected the module.
    Partition,
    /// The executor rejected or failed the run.
    Executor,
    /// A backend failed to compile or verify.
    Compile,
}

/// Errors surfaced by the host manager.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("network not found: {0}")]
    NetNotFound(String),

    #[error("network busy: {0}")]
    NetBusy(String),

    #[error("request refused: {0}")]
    RequestRefused(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Device(#[from] device_manager::DeviceError),

    #[error(transparent)]
    Partition(#[from] partitioner::PartitionError),

    #[error(transparent)]
    Executor(#[from] executor::ExecutorError),

    #[error(transparent)]
    Backend(#[from] backend_core::BackendError),

    #[error(transparent)]
    Graph(#[from] graph_ir::GraphError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HostError {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            HostError::Runtime(_) => ErrorCode::Runtime,
            HostError::NetNotFound(_) => ErrorCode::NetNotFound,
            HostError::NetBusy(_) => ErrorCode::NetBusy,
            HostError::RequestRefused(_) => ErrorCode::RequestRefused,
            HostError::Device(_) => ErrorCode::Device,
            HostError::Partition(_) => ErrorCode::Partition,
            HostError::Executor(_) => ErrorCode::Executor,
            HostError::Backend(_) => ErrorCode::Compile,
            HostError::Graph(_) => ErrorCode::Runtime,
            HostError::Config(_) | HostError::Io(_) | HostError::Serialize(_) => {
                ErrorCode::Runtime
            }
        }
    }
}

/// First error wins; the rest are logged and suppressed.
#[derive(Default)]
pub struct OneErr {
    first: Option<HostError>,
}

impl OneErr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one result.
    pub fn set(&mut self, result: Result<(), HostError>) {
        match (result, self.first.is_some()) {
            (Ok(()), _) => {}
            (Err(e), false) => self.first = Some(e),
            (Err(e), true) => tracing::warn!("suppressed error: {e}"),
        }
    }

    /// The first error seen, if any.
    pub fn into_result(self) -> Result<(), HostError> {
        match self.first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(HostError::Runtime("x".into()).code(), ErrorCode::Runtime);
        assert_eq!(
            HostError::NetNotFound("x".into()).code(),
            ErrorCode::NetNotFound
        );
        assert_eq!(HostError::NetBusy("x".into()).code(), ErrorCode::NetBusy);
        assert_eq!(
            HostError::RequestRefused("x".into()).code(),
            ErrorCode::RequestRefused
        );
    }

    #[test]
    fn test_first_error_wins() {
        let mut agg = OneErr::new();
        agg.set(Ok(()));
        agg.set(Err(HostError::Runtime("first".into())));
        agg.set(Err(HostError::Runtime("second".into())));
        match agg.into_result() {
            Err(HostError::Runtime(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_all_ok() {
        let mut agg = OneErr::new();
        agg.set(Ok(()));
        assert!(agg.into_result().is_ok());
    }
}
