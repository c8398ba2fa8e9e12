// Copyright (c) The cts-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for partitioning a resolved package list across several devices.
//!
//! Packages are assigned by sorted-index modulo shard count. The interleaving
//! balances load when package cost is roughly uniform, and the assignment is a
//! pure function of the sorted list and the shard count, so reruns and resumes
//! target the same shard contents.

use crate::errors::ShardError;

/// This orchestrator instance's position in a sharded run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShardAssignment {
    index: usize,
    total: usize,
}

impl ShardAssignment {
    /// Creates a new assignment. `index` must be below `total`, and `total`
    /// at least 1.
    pub fn new(index: usize, total: usize) -> Result<Self, ShardError> {
        if total < 1 {
            return Err(ShardError::InvalidTotal);
        }
        if index >= total {
            return Err(ShardError::IndexOutOfRange { index, total });
        }
        Ok(Self { index, total })
    }

    /// The assignment of an unsharded run.
    pub fn single() -> Self {
        Self { index: 0, total: 1 }
    }

    /// Returns this shard's index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the total shard count.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the sorted-list indices assigned to this shard.
    ///
    /// When the shard count exceeds the package count, the effective count is
    /// clamped so no package is left unassigned; trailing shards come up
    /// empty.
    pub fn indices(&self, len: usize) -> impl Iterator<Item = usize> + use<> {
        let step = self.total.min(len).max(1);
        (self.index..len).step_by(step)
    }
}

/// Partitions a deterministically sorted list into `min(total_shards, len)`
/// disjoint, covering subsets.
///
/// Returns `None` if `total_shards <= 1`: the run is not shardable and
/// proceeds unsplit.
pub fn partition<T: Clone>(sorted: &[T], total_shards: usize) -> Option<Vec<Vec<T>>> {
    if total_shards <= 1 {
        return None;
    }
    let shard_count = total_shards.min(sorted.len()).max(1);
    let mut shards = vec![Vec::new(); shard_count];
    for (i, item) in sorted.iter().enumerate() {
        shards[i % shard_count].push(item.clone());
    }
    Some(shards)
}
