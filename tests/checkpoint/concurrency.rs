//! Concurrency Tests
//!
//! One coordinator serves every partition; saves and restores for
//! different partitions run as independent tasks.

use cellsnap::ModuloPartitioner;

use crate::common::*;

const PARTITIONS: u32 = 8;

fn modulo_coordinator(
    backend: Arc<dyn ObjectBackend>,
    store: Arc<MemoryCellStore>,
) -> Arc<CheckpointCoordinator> {
    let map = ModuloPartitioner::new(PARTITIONS.try_into().unwrap());
    let config = ImageStorageConfig::for_testing();
    Arc::new(CheckpointCoordinator::new(backend, store, Arc::new(map), &config).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn partitions_save_and_restore_in_parallel() {
    init_tracing();
    let backend = memory_backend();
    let source = Arc::new(MemoryCellStore::new());
    let records: Vec<Record> = (1..=400u64)
        .map(|id| Record::new(id, (id % 3) as TypeTag, format!("cell-{id}")))
        .collect();
    for record in &records {
        source
            .write(record.id, record.type_tag, &record.payload)
            .unwrap();
    }

    let saver = modulo_coordinator(Arc::clone(&backend), source);
    let saves: Vec<_> = (0..PARTITIONS)
        .map(|p| {
            let saver = Arc::clone(&saver);
            tokio::spawn(async move { saver.save_partition(PartitionId(p)).await })
        })
        .collect();
    let mut saved = Vec::new();
    for task in saves {
        saved.push(task.await.unwrap().unwrap());
    }

    let target = Arc::new(MemoryCellStore::new());
    let loader = modulo_coordinator(backend, target.clone());
    let loads: Vec<_> = (0..PARTITIONS)
        .map(|p| {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load_partition(PartitionId(p)).await })
        })
        .collect();
    for (task, expected) in loads.into_iter().zip(saved) {
        assert_eq!(task.await.unwrap().unwrap(), expected);
    }

    let restored: Vec<Record> = target
        .entries()
        .into_iter()
        .map(|(id, tag, payload)| Record::new(id, tag, payload))
        .collect();
    assert_eq!(restored, records);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_saves_of_same_partition_converge() {
    let p = PartitionId(2);
    let node = TestNode::in_memory(p);
    node.put_all(&sample_records());
    let node = Arc::new(node);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let node = Arc::clone(&node);
            tokio::spawn(async move { node.coordinator.save_partition(p).await })
        })
        .collect();
    let mut fingerprints = Vec::new();
    for task in tasks {
        fingerprints.push(task.await.unwrap().unwrap());
    }

    // Identical contents: whichever commit lands last, the image is the same
    fingerprints.dedup();
    assert_eq!(fingerprints.len(), 1);
    assert_eq!(node.image_records(p).await, sample_records());
}
