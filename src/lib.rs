//! cellsnap - Partition image checkpoint and restore for in-memory cell stores
//!
//! An application keeps its records in an in-memory cell store, split into
//! partitions by an ownership map. cellsnap writes each partition's records
//! to a durable object store as a single streamed image, reads it back on
//! restart, and keeps a small JSON signature per partition so peers can
//! tell whether their copy is stale.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use cellsnap::{
//!     CheckpointCoordinator, ImageStorageConfig, MemoryCellStore, ModuloPartitioner,
//!     ObjectStoreBackend, PartitionId, PartitionSignature,
//! };
//!
//! let config = ImageStorageConfig::default();
//! let backend = Arc::new(ObjectStoreBackend::local("/var/lib/cells", &config)?);
//! let store = Arc::new(MemoryCellStore::new());
//! let map = Arc::new(ModuloPartitioner::new(16.try_into()?));
//! let coordinator = CheckpointCoordinator::new(backend, store, map, &config)?;
//!
//! let p = PartitionId(3);
//! let fingerprint = coordinator.save_partition(p).await?;
//! coordinator.save_signature(&PartitionSignature::new(p, fingerprint)).await?;
//! ```
//!
//! # Architecture
//!
//! - `cellsnap-core`: ids, records, fingerprints, signatures
//! - `cellsnap-storage`: the local cell store and ownership map contracts
//! - `cellsnap-durability`: image codec, object backend, checkpoint coordinator

pub use cellsnap_core::{
    Fingerprint, PartitionId, PartitionSignature, Record, RecordId, TypeTag, TERMINATOR_ID,
};
pub use cellsnap_durability::{
    BackendError, CancellationToken, CheckpointCoordinator, CheckpointError, CheckpointResult,
    CodecError, ConfigError, FixedBackoff, ImageLayout, ImageStorageConfig, ObjectBackend,
    ObjectStoreBackend, RestoreFailurePolicy, RetryDecision, RetryPolicy,
};
pub use cellsnap_storage::{
    CellStore, MemoryCellStore, ModuloPartitioner, PartitionMap, StaticPartitionMap, StoreError,
};

/// Image codec, backend and fault-injection modules
pub use cellsnap_durability::{backend, codec, testing};
