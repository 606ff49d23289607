//! Partition ownership
//!
//! The ownership map decides which partition a record belongs to. The
//! checkpoint layer treats it as a pure function that is stable for the
//! duration of one save.

use std::collections::HashMap;
use std::num::NonZeroU32;

use cellsnap_core::{PartitionId, RecordId};

use crate::store::CellStore;

/// Maps a record id to its owning partition
pub trait PartitionMap: Send + Sync {
    /// The partition that owns `id`
    fn partition_of(&self, id: RecordId) -> PartitionId;
}

/// Assigns records to `id % partition_count`
#[derive(Debug, Clone, Copy)]
pub struct ModuloPartitioner {
    partition_count: NonZeroU32,
}

impl ModuloPartitioner {
    /// Create a partitioner over `partition_count` partitions
    pub fn new(partition_count: NonZeroU32) -> Self {
        ModuloPartitioner { partition_count }
    }

    /// Number of partitions
    pub fn partition_count(&self) -> u32 {
        self.partition_count.get()
    }
}

impl PartitionMap for ModuloPartitioner {
    fn partition_of(&self, id: RecordId) -> PartitionId {
        PartitionId((id % u64::from(self.partition_count.get())) as u32)
    }
}

/// Explicit id → partition assignments with a fallback partition
#[derive(Debug, Clone)]
pub struct StaticPartitionMap {
    assignments: HashMap<RecordId, PartitionId>,
    default_partition: PartitionId,
}

impl StaticPartitionMap {
    /// Create a map that sends every unassigned id to `default_partition`
    pub fn new(default_partition: PartitionId) -> Self {
        StaticPartitionMap {
            assignments: HashMap::new(),
            default_partition,
        }
    }

    /// Assign `id` to `partition` (builder pattern)
    pub fn with(mut self, id: RecordId, partition: PartitionId) -> Self {
        self.assign(id, partition);
        self
    }

    /// Assign `id` to `partition`
    pub fn assign(&mut self, id: RecordId, partition: PartitionId) {
        self.assignments.insert(id, partition);
    }
}

impl PartitionMap for StaticPartitionMap {
    fn partition_of(&self, id: RecordId) -> PartitionId {
        self.assignments
            .get(&id)
            .copied()
            .unwrap_or(self.default_partition)
    }
}

/// Ids of all stored records owned by `partition`.
///
/// Combines the store's full listing with a per-record ownership lookup
/// and keeps the store's enumeration order.
pub fn records_owned_by(
    store: &dyn CellStore,
    partitions: &dyn PartitionMap,
    partition: PartitionId,
) -> Vec<RecordId> {
    store
        .record_ids()
        .into_iter()
        .filter(|id| partitions.partition_of(*id) == partition)
        .collect()
}
