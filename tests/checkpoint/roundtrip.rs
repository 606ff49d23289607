//! Save/Restore Round-Trip Tests
//!
//! A partition saved on one node restores to the same records on another.

use crate::common::*;

#[tokio::test]
async fn saved_partition_restores_on_peer() {
    let p = PartitionId(3);
    let node = TestNode::in_memory(p);
    node.put_all(&sample_records());

    let saved = node.coordinator.save_partition(p).await.unwrap();
    assert_eq!(node.image_records(p).await, sample_records());

    let peer = node.peer(map_owning(p, &[1, 2]));
    assert!(peer.store.is_empty());
    let loaded = peer.coordinator.load_partition(p).await.unwrap();

    assert_eq!(saved, loaded);
    assert_eq!(peer.records(), sample_records());
}

#[tokio::test]
async fn save_only_includes_owned_records() {
    let p = PartitionId(3);
    let node = TestNode::on_backend(
        memory_backend(),
        map_owning(p, &[1, 2]),
        ImageStorageConfig::for_testing(),
    );
    node.put_all(&sample_records());
    node.put_all(&[Record::new(10, 1, "elsewhere"), Record::new(11, 1, "too")]);

    node.coordinator.save_partition(p).await.unwrap();
    assert_eq!(node.image_records(p).await, sample_records());

    node.coordinator.save_partition(PartitionId(0)).await.unwrap();
    assert_eq!(
        node.image_records(PartitionId(0)).await,
        vec![Record::new(10, 1, "elsewhere"), Record::new(11, 1, "too")]
    );
}

#[tokio::test]
async fn unchanged_records_give_equal_fingerprints() {
    let p = PartitionId(5);
    let node = TestNode::in_memory(p);
    node.put_all(&sample_records());

    let first = node.coordinator.save_partition(p).await.unwrap();
    let second = node.coordinator.save_partition(p).await.unwrap();
    assert_eq!(first, second);

    node.put_all(&[Record::new(3, 7, "ccc")]);
    let third = node.coordinator.save_partition(p).await.unwrap();
    assert_ne!(first, third);
}

#[tokio::test]
async fn restore_overwrites_existing_records() {
    let p = PartitionId(2);
    let node = TestNode::in_memory(p);
    node.put_all(&sample_records());
    node.coordinator.save_partition(p).await.unwrap();

    // Local edits after the save are replaced by the image contents
    node.put_all(&[Record::new(1, 9, "edited")]);
    node.coordinator.load_partition(p).await.unwrap();
    assert_eq!(node.records(), sample_records());
}

#[tokio::test]
async fn restoring_twice_is_idempotent() {
    let p = PartitionId(2);
    let node = TestNode::in_memory(p);
    node.put_all(&sample_records());
    node.coordinator.save_partition(p).await.unwrap();

    let peer = node.peer(map_owning(p, &[1, 2]));
    let first = peer.coordinator.load_partition(p).await.unwrap();
    let second = peer.coordinator.load_partition(p).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(peer.records(), sample_records());
}

#[tokio::test]
async fn empty_partition_round_trips() {
    let p = PartitionId(9);
    let node = TestNode::in_memory(p);

    node.coordinator.save_partition(p).await.unwrap();
    assert!(node.image_records(p).await.is_empty());

    let peer = node.peer(map_owning(p, &[]));
    peer.coordinator.load_partition(p).await.unwrap();
    assert!(peer.store.is_empty());
}

#[tokio::test]
async fn large_payloads_stream_through() {
    let p = PartitionId(1);
    let node = TestNode::in_memory(p);
    let records: Vec<Record> = (1..=64u64)
        .map(|id| Record::new(id, (id % 5) as TypeTag, vec![id as u8; 32 * 1024]))
        .collect();
    node.put_all(&records);

    let saved = node.coordinator.save_partition(p).await.unwrap();

    let peer = node.peer(map_owning(p, &[]));
    let loaded = peer.coordinator.load_partition(p).await.unwrap();
    assert_eq!(saved, loaded);
    assert_eq!(peer.records(), records);
}

#[tokio::test]
async fn bytes_after_terminator_are_ignored() {
    let p = PartitionId(4);
    let node = TestNode::in_memory(p);

    let mut image = encode_records(&sample_records()).unwrap();
    image.extend_from_slice(b"trailing garbage that is never decoded");
    node.put_raw_image(p, image.clone()).await;

    let fingerprint = node.coordinator.load_partition(p).await.unwrap();
    assert_eq!(node.records(), sample_records());
    // The fingerprint covers the whole object, trailing bytes included
    assert_eq!(fingerprint, Fingerprint::of(&image));
}

#[tokio::test]
async fn saved_partitions_lists_images() {
    let node = TestNode::in_memory(PartitionId(0));
    assert!(node.coordinator.saved_partitions().await.unwrap().is_empty());

    for p in [7, 2, 30] {
        node.coordinator.save_partition(PartitionId(p)).await.unwrap();
    }
    assert_eq!(
        node.coordinator.saved_partitions().await.unwrap(),
        vec![PartitionId(2), PartitionId(7), PartitionId(30)]
    );
    assert!(node.coordinator.image_exists(PartitionId(7)).await.unwrap());
    assert!(!node.coordinator.image_exists(PartitionId(8)).await.unwrap());
}
