//! Retry Tests
//!
//! Transient backend failures are retried under the configured policy;
//! cancellation and bounded policies end the loop.

use std::time::Duration;

use crate::common::*;

fn faulty_node(
    partition: PartitionId,
    failures: u32,
    config: ImageStorageConfig,
) -> (Arc<FaultyBackend>, Arc<RecordingPolicy>, TestNode) {
    let faulty = Arc::new(FaultyBackend::new(memory_backend(), failures));
    let policy = Arc::new(RecordingPolicy::new(Arc::new(config.retry_policy())));
    let mut node = TestNode::on_backend(
        faulty.clone(),
        StaticPartitionMap::new(partition),
        config,
    );
    node.coordinator = node.coordinator.with_retry_policy(policy.clone());
    (faulty, policy, node)
}

#[tokio::test]
async fn save_succeeds_after_k_failures() {
    for k in [1u32, 3, 5] {
        let p = PartitionId(3);
        let (faulty, policy, node) = faulty_node(p, k, ImageStorageConfig::for_testing());
        node.put_all(&sample_records());

        let fingerprint = node.coordinator.save_partition(p).await.unwrap();

        // K failed attempts, each followed by one delay, then success on K+1
        assert_eq!(policy.retries(), k);
        assert_eq!(policy.give_ups(), 0);
        assert_eq!(faulty.calls(), k + 1);
        assert_eq!(node.image_records(p).await, sample_records());
        assert_eq!(
            fingerprint,
            node.coordinator.load_partition(p).await.unwrap()
        );
    }
}

#[tokio::test]
async fn load_retries_transient_failures() {
    let p = PartitionId(4);
    let (faulty, policy, node) = faulty_node(p, 0, ImageStorageConfig::for_testing());
    node.put_all(&sample_records());
    node.coordinator.save_partition(p).await.unwrap();
    node.store.clear();

    faulty.fail_next(2);
    node.coordinator.load_partition(p).await.unwrap();
    assert_eq!(policy.retries(), 2);
    assert_eq!(node.records(), sample_records());
}

#[tokio::test]
async fn failed_save_attempts_abort_their_uploads() {
    let p = PartitionId(3);
    let (faulty, policy, node) = faulty_node(p, 0, ImageStorageConfig::for_testing());
    node.put_all(&sample_records());

    faulty.interrupt_writes(2);
    node.coordinator.save_partition(p).await.unwrap();

    assert_eq!(policy.retries(), 2);
    assert_eq!(faulty.aborted_uploads(), 2);
    assert_eq!(node.image_records(p).await, sample_records());
}

#[tokio::test(start_paused = true)]
async fn stalled_image_body_is_timed_out_and_retried() {
    let p = PartitionId(4);
    let config =
        ImageStorageConfig::for_testing().with_request_timeout(Duration::from_millis(100));
    let stalling = Arc::new(StallingStore::new(
        Arc::new(object_store::memory::InMemory::new()),
        0,
    ));
    let backend: Arc<dyn ObjectBackend> =
        Arc::new(ObjectStoreBackend::new(stalling.clone(), &config));
    let policy = Arc::new(RecordingPolicy::new(Arc::new(config.retry_policy())));
    let mut node = TestNode::on_backend(backend, StaticPartitionMap::new(p), config);
    node.coordinator = node.coordinator.with_retry_policy(policy.clone());

    node.put_all(&sample_records());
    let saved = node.coordinator.save_partition(p).await.unwrap();
    node.store.clear();

    // Two bodies in a row go silent halfway through
    stalling.stall_next(2);
    let loaded = node.coordinator.load_partition(p).await.unwrap();

    assert_eq!(loaded, saved);
    assert_eq!(stalling.stalls_remaining(), 0);
    assert_eq!(policy.retries(), 2);
    assert_eq!(node.records(), sample_records());
}

#[tokio::test]
async fn signature_operations_retry() {
    let p = PartitionId(6);
    let (faulty, policy, node) = faulty_node(p, 2, ImageStorageConfig::for_testing());

    let sig = PartitionSignature::new(p, Fingerprint::of(b"img"));
    node.coordinator.save_signature(&sig).await.unwrap();
    assert_eq!(policy.retries(), 2);

    faulty.fail_next(1);
    assert_eq!(node.coordinator.load_signature(p).await.unwrap(), sig);
    assert_eq!(policy.retries(), 3);
}

#[tokio::test]
async fn bounded_policy_reports_last_error() {
    let p = PartitionId(2);
    let config = ImageStorageConfig::for_testing().with_max_attempts(3);
    let (faulty, policy, node) = faulty_node(p, u32::MAX, config);

    let err = node.coordinator.save_partition(p).await.unwrap_err();
    match err {
        CheckpointError::RetriesExhausted {
            partition,
            attempts,
            last_error,
        } => {
            assert_eq!(partition, p);
            assert_eq!(attempts, 3);
            assert!(matches!(
                *last_error,
                CheckpointError::Backend(BackendError::Io(_))
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(policy.retries(), 2);
    assert_eq!(policy.give_ups(), 1);
    assert_eq!(faulty.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn default_interval_is_five_seconds() {
    let p = PartitionId(1);
    let config = ImageStorageConfig {
        retry_interval: Duration::from_secs(5),
        ..ImageStorageConfig::for_testing()
    };
    let (_faulty, policy, node) = faulty_node(p, 2, config);

    let start = tokio::time::Instant::now();
    node.coordinator.save_partition(p).await.unwrap();
    assert_eq!(policy.retries(), 2);
    assert!(start.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_backoff() {
    let p = PartitionId(7);
    let config = ImageStorageConfig::for_testing().with_retry_interval(Duration::from_secs(60));
    let (_faulty, _policy, node) = faulty_node(p, u32::MAX, config);
    let token = node.coordinator.cancellation_token().clone();
    let coordinator = Arc::new(node.coordinator);

    let task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.save_partition(p).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, CheckpointError::Cancelled { partition } if partition == p));

    // Further calls on a cancelled coordinator fail without touching storage
    let err = coordinator.load_signature(p).await.unwrap_err();
    assert!(matches!(err, CheckpointError::Cancelled { .. }));
}

#[tokio::test]
async fn shared_token_cancels_every_partition() {
    let token = CancellationToken::new();
    let config = ImageStorageConfig::for_testing().with_retry_interval(Duration::from_secs(3600));
    let faulty = Arc::new(FaultyBackend::new(memory_backend(), u32::MAX));
    let node = TestNode::on_backend(faulty, StaticPartitionMap::new(PartitionId(0)), config);
    let coordinator = Arc::new(node.coordinator.with_cancellation(token.clone()));

    let tasks: Vec<_> = (0..4u32)
        .map(|p| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.save_partition(PartitionId(p)).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    for task in tasks {
        assert!(matches!(
            task.await.unwrap(),
            Err(CheckpointError::Cancelled { .. })
        ));
    }
}
