//! Signature persistence
//!
//! Each partition's signature lives in `{folder}/{partition}.sig` as JSON.
//! A partition that was never saved has no signature object; loading it
//! yields [`PartitionSignature::absent`] rather than an error. A signature
//! object that is not valid JSON, or that names a different partition, is
//! treated the same way: it is logged and reported as absent, so the next
//! save simply overwrites it.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use cellsnap_core::{PartitionId, PartitionSignature};

use crate::backend::{BackendError, ObjectBackend};
use crate::error::CheckpointResult;
use crate::layout::ImageLayout;
use crate::retry::Retrier;

/// Loads and saves partition signatures
pub struct SignatureStore {
    backend: Arc<dyn ObjectBackend>,
    layout: ImageLayout,
    retrier: Retrier,
}

impl SignatureStore {
    /// Create a signature store over `backend`
    pub fn new(backend: Arc<dyn ObjectBackend>, layout: ImageLayout, retrier: Retrier) -> Self {
        SignatureStore {
            backend,
            layout,
            retrier,
        }
    }

    /// Replace the retrier
    pub(crate) fn set_retrier(&mut self, retrier: Retrier) {
        self.retrier = retrier;
    }

    /// Fetch the signature for `partition`, or the absent sentinel
    pub async fn load(&self, partition: PartitionId) -> CheckpointResult<PartitionSignature> {
        let name = &self.layout.signature_name(partition);
        self.retrier
            .run(partition, "load signature", move || async move {
                match self.backend.read_all(name).await {
                    Ok(bytes) => Ok(parse_signature(partition, name, &bytes)),
                    Err(BackendError::NotFound(_)) => {
                        debug!(
                            target: "cellsnap::checkpoint",
                            partition = %partition,
                            "No signature stored"
                        );
                        Ok(PartitionSignature::absent(partition))
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Persist `signature` as the partition's signature object
    pub async fn save(&self, signature: &PartitionSignature) -> CheckpointResult<()> {
        let partition = signature.partition_id;
        let name = &self.layout.signature_name(partition);
        let json = &Bytes::from(signature.to_json_bytes()?);
        self.retrier
            .run(partition, "save signature", move || async move {
                self.backend.write_all(name, json.clone()).await?;
                Ok(())
            })
            .await?;
        debug!(
            target: "cellsnap::checkpoint",
            partition = %partition,
            fingerprint = %signature.content_fingerprint,
            "Signature saved"
        );
        Ok(())
    }
}

fn parse_signature(partition: PartitionId, name: &str, bytes: &[u8]) -> PartitionSignature {
    match PartitionSignature::from_json_bytes(bytes) {
        Ok(signature) if signature.partition_id == partition => signature,
        Ok(signature) => {
            warn!(
                target: "cellsnap::checkpoint",
                partition = %partition,
                stored = %signature.partition_id,
                object = name,
                "Signature names a different partition, treating as absent"
            );
            PartitionSignature::absent(partition)
        }
        Err(e) => {
            warn!(
                target: "cellsnap::checkpoint",
                partition = %partition,
                object = name,
                error = %e,
                "Malformed signature, treating as absent"
            );
            PartitionSignature::absent(partition)
        }
    }
}
