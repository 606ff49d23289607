//! MemoryCellStore: ordered in-memory cell store
//!
//! Records live in a `BTreeMap<RecordId, StoredCell>` behind a
//! `parking_lot::RwLock`, so enumeration order is ascending id order and
//! stable between calls.
//!
//! Two knobs let callers make the store refuse writes:
//! - read-only mode rejects every mutation
//! - an optional capacity rejects inserts of new ids once full
//!   (overwrites of existing ids are still accepted)

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use cellsnap_core::{RecordId, TypeTag, TERMINATOR_ID};

use crate::store::{CellStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredCell {
    type_tag: TypeTag,
    payload: Vec<u8>,
}

/// Thread-safe in-memory cell store
#[derive(Debug, Default)]
pub struct MemoryCellStore {
    cells: RwLock<BTreeMap<RecordId, StoredCell>>,
    read_only: AtomicBool,
    capacity: Option<usize>,
}

impl MemoryCellStore {
    /// Create an empty, writable, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that holds at most `capacity` records
    pub fn with_capacity_limit(capacity: usize) -> Self {
        MemoryCellStore {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Enable or disable read-only mode
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// True if mutations are currently rejected
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    /// True if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    /// Drop every record
    pub fn clear(&self) {
        self.cells.write().clear();
    }

    /// Copy out all records as `(id, type_tag, payload)`, ascending by id
    pub fn entries(&self) -> Vec<(RecordId, TypeTag, Vec<u8>)> {
        self.cells
            .read()
            .iter()
            .map(|(id, cell)| (*id, cell.type_tag, cell.payload.clone()))
            .collect()
    }
}

impl CellStore for MemoryCellStore {
    fn write(&self, id: RecordId, type_tag: TypeTag, payload: &[u8]) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        if id == TERMINATOR_ID {
            return Err(StoreError::Rejected {
                id,
                reason: "record id 0 is reserved".to_string(),
            });
        }

        let mut cells = self.cells.write();
        if let Some(capacity) = self.capacity {
            if cells.len() >= capacity && !cells.contains_key(&id) {
                return Err(StoreError::CapacityExceeded { capacity });
            }
        }
        cells.insert(
            id,
            StoredCell {
                type_tag,
                payload: payload.to_vec(),
            },
        );
        Ok(())
    }

    fn read(&self, id: RecordId) -> StoreResult<(Vec<u8>, TypeTag)> {
        self.cells
            .read()
            .get(&id)
            .map(|cell| (cell.payload.clone(), cell.type_tag))
            .ok_or(StoreError::NotFound(id))
    }

    fn remove(&self, id: RecordId) -> StoreResult<bool> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        Ok(self.cells.write().remove(&id).is_some())
    }

    fn record_ids(&self) -> Vec<RecordId> {
        self.cells.read().keys().copied().collect()
    }
}
