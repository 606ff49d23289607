//! Checkpoint coordinator
//!
//! Saves a partition's records from the local cell store into a durable
//! image object, restores them from it, and keeps the per-partition
//! signature that describes which image is current.
//!
//! # Save
//!
//! 1. Enumerate the ids the ownership map assigns to the partition
//! 2. Read each record from the local store
//! 3. Stream the records through the codec into a fresh write channel
//! 4. Commit and return the image fingerprint
//!
//! Every failure on this path is retried as a whole: nothing is visible
//! until the commit, and the commit replaces the previous image. A failed
//! attempt aborts its upload so the service discards any staged parts.
//!
//! # Restore
//!
//! 1. Open a read channel on the partition image
//! 2. Decode records one at a time, writing each into the local store
//!    before the next is fetched
//! 3. Drain the channel and return the image fingerprint
//!
//! Transport failures restart the restore from the first record. Writes
//! are keyed by id, so a replay only repeats work. A malformed image or a
//! record the store refuses aborts the restore without a retry.
//!
//! Under `RestoreFailurePolicy::RemoveApplied` the coordinator remembers
//! what each id held before the restore first wrote it, and a failed
//! restore puts that back: new ids are removed and overwritten records
//! get their previous value.
//!
//! # Ordering
//!
//! The coordinator does not sequence images and signatures. Callers save
//! the image first and then the signature naming its fingerprint; between
//! the two, readers see the new image under the old signature.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cellsnap_core::{Fingerprint, PartitionId, PartitionSignature, RecordId, TypeTag};
use cellsnap_storage::{records_owned_by, CellStore, PartitionMap};

use crate::backend::{BackendError, ObjectBackend, WriteChannel};
use crate::codec::{AsyncRecordReader, AsyncRecordWriter};
use crate::config::{ConfigError, ImageStorageConfig, RestoreFailurePolicy};
use crate::error::{CheckpointError, CheckpointResult};
use crate::layout::ImageLayout;
use crate::retry::{Retrier, RetryPolicy};
use crate::signature::SignatureStore;

/// What an id held before a restore first wrote it (`None` if absent)
type PriorCells = BTreeMap<RecordId, Option<(Vec<u8>, TypeTag)>>;

/// Coordinates partition image save/restore and signature bookkeeping.
///
/// One coordinator serves every partition. Calls for different partitions
/// are independent and may run concurrently; share the coordinator
/// through an `Arc`.
pub struct CheckpointCoordinator {
    backend: Arc<dyn ObjectBackend>,
    store: Arc<dyn CellStore>,
    partitions: Arc<dyn PartitionMap>,
    layout: ImageLayout,
    signatures: SignatureStore,
    retrier: Retrier,
    restore_failure_policy: RestoreFailurePolicy,
}

impl CheckpointCoordinator {
    /// Create a coordinator.
    ///
    /// The retry policy and folder come from `config`, which is validated
    /// first.
    pub fn new(
        backend: Arc<dyn ObjectBackend>,
        store: Arc<dyn CellStore>,
        partitions: Arc<dyn PartitionMap>,
        config: &ImageStorageConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let layout = ImageLayout::new(config.folder.clone());
        let retrier = Retrier::new(Arc::new(config.retry_policy()), CancellationToken::new());
        let signatures = SignatureStore::new(Arc::clone(&backend), layout.clone(), retrier.clone());

        Ok(CheckpointCoordinator {
            backend,
            store,
            partitions,
            layout,
            signatures,
            retrier,
            restore_failure_policy: config.restore_failure_policy,
        })
    }

    /// Replace the retry policy (builder pattern)
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retrier = self.retrier.with_policy(policy);
        self.signatures.set_retrier(self.retrier.clone());
        self
    }

    /// Use `token` to abort pending retries (builder pattern)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.retrier = self.retrier.with_cancellation(token);
        self.signatures.set_retrier(self.retrier.clone());
        self
    }

    /// The token that aborts pending retries.
    ///
    /// Cancelling it makes every in-flight call return
    /// [`CheckpointError::Cancelled`] at its next retry wait.
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.retrier.cancellation_token()
    }

    /// Object naming in use
    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    /// Fetch the signature of `partition`.
    ///
    /// A partition that was never saved, or whose signature cannot be
    /// parsed, yields [`PartitionSignature::absent`].
    pub async fn load_signature(
        &self,
        partition: PartitionId,
    ) -> CheckpointResult<PartitionSignature> {
        self.signatures.load(partition).await
    }

    /// Persist `signature`, retrying transient failures
    pub async fn save_signature(&self, signature: &PartitionSignature) -> CheckpointResult<()> {
        self.signatures.save(signature).await
    }

    /// True if an image exists for `partition`
    pub async fn image_exists(&self, partition: PartitionId) -> CheckpointResult<bool> {
        Ok(self.backend.exists(&self.layout.image_name(partition)).await?)
    }

    /// Partitions that have an image in the folder, ascending
    pub async fn saved_partitions(&self) -> CheckpointResult<Vec<PartitionId>> {
        let names = self.backend.list(self.layout.folder()).await?;
        let partitions: BTreeSet<PartitionId> = names
            .iter()
            .filter_map(|name| self.layout.parse_image_name(name))
            .collect();
        Ok(partitions.into_iter().collect())
    }

    /// Write every record owned by `partition` into its image.
    ///
    /// Returns the fingerprint of the committed image.
    pub async fn save_partition(&self, partition: PartitionId) -> CheckpointResult<Fingerprint> {
        let name = &self.layout.image_name(partition);
        let (records, fingerprint) = self
            .retrier
            .run(partition, "save image", move || async move {
                self.save_attempt(partition, name).await
            })
            .await?;

        info!(
            target: "cellsnap::checkpoint",
            partition = %partition,
            records,
            fingerprint = %fingerprint,
            "Partition image saved"
        );
        Ok(fingerprint)
    }

    /// Restore `partition` from its image into the local store.
    ///
    /// Returns the fingerprint of the image that was read, for comparison
    /// with the partition signature.
    pub async fn load_partition(&self, partition: PartitionId) -> CheckpointResult<Fingerprint> {
        let name = &self.layout.image_name(partition);
        let applied = &Mutex::new(PriorCells::new());

        let result = self
            .retrier
            .run(partition, "load image", move || async move {
                self.load_attempt(partition, name, applied).await
            })
            .await;

        match result {
            Ok((records, fingerprint)) => {
                info!(
                    target: "cellsnap::checkpoint",
                    partition = %partition,
                    records,
                    fingerprint = %fingerprint,
                    "Partition image loaded"
                );
                Ok(fingerprint)
            }
            Err(e) => {
                if self.restore_failure_policy == RestoreFailurePolicy::RemoveApplied {
                    let applied = std::mem::take(&mut *applied.lock());
                    self.roll_back(partition, applied);
                }
                Err(e)
            }
        }
    }

    async fn save_attempt(
        &self,
        partition: PartitionId,
        name: &str,
    ) -> CheckpointResult<(u64, Fingerprint)> {
        let ids = records_owned_by(self.store.as_ref(), self.partitions.as_ref(), partition);
        debug!(
            target: "cellsnap::checkpoint",
            partition = %partition,
            records = ids.len(),
            object = name,
            "Saving partition image"
        );

        let mut channel = self.backend.open_write(name).await?;
        match self.stream_records(ids, &mut channel).await {
            Ok(records) => {
                let fingerprint = channel.commit().await?;
                Ok((records, fingerprint))
            }
            Err(e) => {
                if let Err(abort_error) = channel.abort().await {
                    warn!(
                        target: "cellsnap::checkpoint",
                        partition = %partition,
                        object = name,
                        error = %abort_error,
                        "Failed to abort image upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn stream_records(
        &self,
        ids: Vec<RecordId>,
        channel: &mut WriteChannel,
    ) -> CheckpointResult<u64> {
        let mut writer = AsyncRecordWriter::new(channel);
        for id in ids {
            let (payload, type_tag) = self
                .store
                .read(id)
                .map_err(|source| CheckpointError::StoreRead { id, source })?;
            writer
                .write_parts(id, type_tag, &payload)
                .await
                .map_err(CheckpointError::Encode)?;
        }

        let records = writer.records_written();
        writer.finish().await.map_err(CheckpointError::Encode)?;
        Ok(records)
    }

    async fn load_attempt(
        &self,
        partition: PartitionId,
        name: &str,
        applied: &Mutex<PriorCells>,
    ) -> CheckpointResult<(u64, Fingerprint)> {
        let channel = match self.backend.open_read(name).await {
            Ok(channel) => channel,
            Err(BackendError::NotFound(_)) => {
                return Err(CheckpointError::ImageNotFound(partition))
            }
            Err(e) => return Err(e.into()),
        };

        let track = self.restore_failure_policy == RestoreFailurePolicy::RemoveApplied;
        let mut reader = AsyncRecordReader::new(channel);
        let mut records = 0u64;
        while let Some(record) = reader.next_record().await.map_err(CheckpointError::Decode)? {
            let prior = (track && !applied.lock().contains_key(&record.id))
                .then(|| self.store.read(record.id).ok());
            self.store
                .write(record.id, record.type_tag, &record.payload)
                .map_err(|source| CheckpointError::StoreRejected {
                    partition,
                    id: record.id,
                    source,
                })?;
            if let Some(prior) = prior {
                applied.lock().insert(record.id, prior);
            }
            records += 1;
        }

        let fingerprint = reader.into_inner().finish().await?;
        Ok((records, fingerprint))
    }

    fn roll_back(&self, partition: PartitionId, applied: PriorCells) {
        let (mut removed, mut reinstated) = (0usize, 0usize);
        for (id, prior) in applied {
            let result = match prior {
                Some((payload, type_tag)) => self
                    .store
                    .write(id, type_tag, &payload)
                    .map(|()| reinstated += 1),
                None => self.store.remove(id).map(|gone| removed += usize::from(gone)),
            };
            if let Err(e) = result {
                warn!(
                    target: "cellsnap::checkpoint",
                    partition = %partition,
                    id,
                    error = %e,
                    "Failed to undo restored record"
                );
            }
        }
        warn!(
            target: "cellsnap::checkpoint",
            partition = %partition,
            removed,
            reinstated,
            "Rolled back records applied by failed restore"
        );
    }
}

impl std::fmt::Debug for CheckpointCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointCoordinator")
            .field("layout", &self.layout)
            .field("retrier", &self.retrier)
            .field("restore_failure_policy", &self.restore_failure_policy)
            .finish_non_exhaustive()
    }
}
