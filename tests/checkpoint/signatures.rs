//! Signature Tests
//!
//! Signatures describe which image is current; peers compare them against
//! their own fingerprints to detect staleness.

use crate::common::*;
use serde_json::json;

#[tokio::test]
async fn never_saved_partition_has_absent_signature() {
    let node = TestNode::in_memory(PartitionId(0));
    let sig = node.coordinator.load_signature(PartitionId(99)).await.unwrap();
    assert_eq!(sig.partition_id, PartitionId(99));
    assert!(sig.is_absent());
    assert!(sig.content_fingerprint.as_str().is_empty());
}

#[tokio::test]
async fn signature_tracks_saved_image() {
    let p = PartitionId(3);
    let node = TestNode::in_memory(p);
    node.put_all(&sample_records());

    let fingerprint = node.coordinator.save_partition(p).await.unwrap();
    node.coordinator
        .save_signature(&PartitionSignature::new(p, fingerprint.clone()))
        .await
        .unwrap();

    let peer = node.peer(map_owning(p, &[]));
    let sig = peer.coordinator.load_signature(p).await.unwrap();
    assert_eq!(sig.content_fingerprint, fingerprint);
    assert!(sig.matches(&fingerprint));
}

#[tokio::test]
async fn stale_copy_detected_after_new_save() {
    let p = PartitionId(3);
    let node = TestNode::in_memory(p);
    node.put_all(&sample_records());

    let old = node.coordinator.save_partition(p).await.unwrap();
    node.coordinator
        .save_signature(&PartitionSignature::new(p, old.clone()))
        .await
        .unwrap();

    // A peer restores and remembers what it loaded
    let peer = node.peer(map_owning(p, &[]));
    let loaded = peer.coordinator.load_partition(p).await.unwrap();
    assert!(peer.coordinator.load_signature(p).await.unwrap().matches(&loaded));

    // The owner changes a record and publishes a new image and signature
    node.put_all(&[Record::new(2, 7, "changed")]);
    let new = node.coordinator.save_partition(p).await.unwrap();
    node.coordinator
        .save_signature(&PartitionSignature::new(p, new))
        .await
        .unwrap();

    let current = peer.coordinator.load_signature(p).await.unwrap();
    assert!(!current.matches(&loaded));
}

#[tokio::test]
async fn image_saved_before_signature_is_visible_under_old_signature() {
    let p = PartitionId(1);
    let node = TestNode::in_memory(p);
    node.put_all(&sample_records());

    let first = node.coordinator.save_partition(p).await.unwrap();
    node.coordinator
        .save_signature(&PartitionSignature::new(p, first.clone()))
        .await
        .unwrap();

    node.put_all(&[Record::new(3, 7, "ccc")]);
    let second = node.coordinator.save_partition(p).await.unwrap();

    // Between the two writes the signature still names the previous image
    let sig = node.coordinator.load_signature(p).await.unwrap();
    assert!(sig.matches(&first));
    assert!(!sig.matches(&second));
}

#[tokio::test]
async fn signature_metadata_round_trips() {
    let p = PartitionId(8);
    let node = TestNode::in_memory(p);
    let sig = PartitionSignature::new(p, Fingerprint::of(b"image"))
        .with_metadata("savedBy", json!("node-7"))
        .with_metadata("generation", json!(12));

    node.coordinator.save_signature(&sig).await.unwrap();
    let loaded = node.coordinator.load_signature(p).await.unwrap();
    assert_eq!(loaded, sig);

    // Stored as readable JSON under {folder}/{p}.sig
    let raw = node.backend.read_all("images/8.sig").await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(value["partitionId"], json!(8));
    assert_eq!(value["savedBy"], json!("node-7"));
}

#[tokio::test]
async fn corrupt_signature_reads_as_absent() {
    let p = PartitionId(5);
    let node = TestNode::in_memory(p);
    node.backend
        .write_all("images/5.sig", bytes::Bytes::from_static(b"\x00\x01garbage"))
        .await
        .unwrap();

    let sig = node.coordinator.load_signature(p).await.unwrap();
    assert!(sig.is_absent());

    // The next save replaces it
    let fresh = PartitionSignature::new(p, Fingerprint::of(b"x"));
    node.coordinator.save_signature(&fresh).await.unwrap();
    assert_eq!(node.coordinator.load_signature(p).await.unwrap(), fresh);
}

#[tokio::test]
async fn signature_copied_from_another_partition_reads_as_absent() {
    let node = TestNode::in_memory(PartitionId(5));
    let foreign = PartitionSignature::new(PartitionId(6), Fingerprint::of(b"six"));
    node.backend
        .write_all(
            "images/5.sig",
            bytes::Bytes::from(serde_json::to_vec(&foreign).unwrap()),
        )
        .await
        .unwrap();

    let sig = node.coordinator.load_signature(PartitionId(5)).await.unwrap();
    assert_eq!(sig, PartitionSignature::absent(PartitionId(5)));
    assert!(!sig.matches(&Fingerprint::of(b"six")));
}
