// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Vendor hook: post-partition DAG optimization.
//!
//! Built only with the `dag-optimizer` feature. The in-tree default
//! re-validates the partitioned DAGs; vendors substitute their own pass
//! stack here.

use crate::HostError;
use partitioner::Dag;

pub(crate) fn optimize_dags(dags: &mut [Dag]) -> Result<(), HostError> {
    for dag in dags.iter() {
        dag.validate()?;
        tracing::debug!(
            "dag optimizer: '{}' verified ({} partition(s))",
            dag.root_name(),
            dag.len(),
        );
    }
    Ok(())
}
