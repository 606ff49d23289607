//! Shared test utilities for the checkpoint integration suite.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

pub use std::sync::Arc;
use std::sync::Once;

pub use cellsnap::codec::{decode_records, encode_records};
pub use cellsnap::testing::{FaultyBackend, RecordingPolicy, StallingStore};
pub use cellsnap::{
    BackendError, CancellationToken, CellStore, CheckpointCoordinator, CheckpointError,
    CodecError, Fingerprint, FixedBackoff, ImageStorageConfig, MemoryCellStore, ObjectBackend,
    ObjectStoreBackend, PartitionId, PartitionSignature, Record, RecordId, RestoreFailurePolicy,
    StaticPartitionMap, StoreError, TypeTag,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route library logs to the test harness output (shown for failing tests).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// TestNode - one process's view: local store + coordinator over shared storage
// ============================================================================

/// A node with its own local cell store, checkpointing to a backend that
/// other nodes may share.
pub struct TestNode {
    pub backend: Arc<dyn ObjectBackend>,
    pub store: Arc<MemoryCellStore>,
    pub coordinator: CheckpointCoordinator,
    pub config: ImageStorageConfig,
}

impl TestNode {
    /// Node over a fresh in-memory backend, every record owned by `partition`
    pub fn in_memory(partition: PartitionId) -> Self {
        let config = ImageStorageConfig::for_testing();
        let backend: Arc<dyn ObjectBackend> = Arc::new(ObjectStoreBackend::in_memory(&config));
        Self::on_backend(backend, StaticPartitionMap::new(partition), config)
    }

    /// Node over an existing backend
    pub fn on_backend(
        backend: Arc<dyn ObjectBackend>,
        map: StaticPartitionMap,
        config: ImageStorageConfig,
    ) -> Self {
        Self::with_store(backend, Arc::new(MemoryCellStore::new()), map, config)
    }

    /// Node over an existing backend and local store
    pub fn with_store(
        backend: Arc<dyn ObjectBackend>,
        store: Arc<MemoryCellStore>,
        map: StaticPartitionMap,
        config: ImageStorageConfig,
    ) -> Self {
        init_tracing();
        let coordinator = CheckpointCoordinator::new(
            Arc::clone(&backend),
            store.clone(),
            Arc::new(map),
            &config,
        )
        .expect("valid test config");
        TestNode {
            backend,
            store,
            coordinator,
            config,
        }
    }

    /// A second node sharing this node's backend, with an empty local store
    pub fn peer(&self, map: StaticPartitionMap) -> TestNode {
        TestNode::on_backend(Arc::clone(&self.backend), map, self.config.clone())
    }

    /// Write records into the local store
    pub fn put_all(&self, records: &[Record]) {
        for record in records {
            self.store
                .write(record.id, record.type_tag, &record.payload)
                .expect("local write");
        }
    }

    /// Local store contents as records, ascending by id
    pub fn records(&self) -> Vec<Record> {
        self.store
            .entries()
            .into_iter()
            .map(|(id, tag, payload)| Record::new(id, tag, payload))
            .collect()
    }

    /// Decode the stored image of `partition`
    pub async fn image_records(&self, partition: PartitionId) -> Vec<Record> {
        let name = self.coordinator.layout().image_name(partition);
        let bytes = self.backend.read_all(&name).await.expect("image present");
        decode_records(&bytes)
            .collect::<Result<_, _>>()
            .expect("image decodes")
    }

    /// Replace the image of `partition` with raw bytes
    pub async fn put_raw_image(&self, partition: PartitionId, bytes: Vec<u8>) {
        let name = self.coordinator.layout().image_name(partition);
        self.backend
            .write_all(&name, bytes.into())
            .await
            .expect("raw image write");
    }
}

/// A fresh in-memory backend
pub fn memory_backend() -> Arc<dyn ObjectBackend> {
    Arc::new(ObjectStoreBackend::in_memory(
        &ImageStorageConfig::for_testing(),
    ))
}

/// The two records every end-to-end scenario starts from
pub fn sample_records() -> Vec<Record> {
    vec![Record::new(1, 7, "a"), Record::new(2, 7, "bb")]
}

/// Map assigning the listed ids to `partition`, everything else to partition 0
pub fn map_owning(partition: PartitionId, ids: &[RecordId]) -> StaticPartitionMap {
    ids.iter().fold(StaticPartitionMap::new(PartitionId(0)), |map, id| {
        map.with(*id, partition)
    })
}
