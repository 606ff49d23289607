//! Local cell store contract
//!
//! The checkpoint layer never looks inside the in-memory store. It only
//! needs to write a record, read a record back, enumerate the ids that are
//! currently stored, and (for `RestoreFailurePolicy::RemoveApplied`) drop a
//! record again.

use cellsnap_core::{RecordId, TypeTag};

/// Result type alias for cell store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Record-at-a-time access to the in-memory cell store.
///
/// # Thread Safety
///
/// Stores are shared by every partition task running concurrently, so
/// implementations must be `Send + Sync` and make each call atomic on its
/// own. No cross-call transactions are expected.
pub trait CellStore: Send + Sync {
    /// Insert or overwrite a record.
    ///
    /// Writes are keyed by id, so writing the same record twice leaves the
    /// store in the same state as writing it once.
    fn write(&self, id: RecordId, type_tag: TypeTag, payload: &[u8]) -> StoreResult<()>;

    /// Read a record's payload and type tag.
    fn read(&self, id: RecordId) -> StoreResult<(Vec<u8>, TypeTag)>;

    /// Remove a record. Returns false if it was not present.
    fn remove(&self, id: RecordId) -> StoreResult<bool>;

    /// Ids of every record currently stored, in the store's enumeration order.
    fn record_ids(&self) -> Vec<RecordId>;
}

/// Cell store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record with this id
    #[error("Record {0} not found")]
    NotFound(RecordId),

    /// The store rejects all mutations
    #[error("Store is read-only")]
    ReadOnly,

    /// The store cannot hold another record
    #[error("Store capacity of {capacity} records exceeded")]
    CapacityExceeded {
        /// Maximum number of records
        capacity: usize,
    },

    /// The store refused this particular record
    #[error("Record {id} rejected: {reason}")]
    Rejected {
        /// Offending record id
        id: RecordId,
        /// Why the store refused it
        reason: String,
    },
}
