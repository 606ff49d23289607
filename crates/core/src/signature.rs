//! Partition signatures
//!
//! A signature is the small metadata object stored next to each partition
//! image. It records which image content the partition was last saved as,
//! so a consumer can decide whether its copy is stale without fetching the
//! image itself.
//!
//! Signatures are stored as JSON so they can be inspected and edited
//! out-of-band:
//!
//! ```text
//! {"partitionId":3,"contentFingerprint":"ungWv48B...","savedBy":"node-7"}
//! ```
//!
//! Fields other than `partitionId` and `contentFingerprint` are kept in
//! `metadata` and survive a load/save cycle untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::types::PartitionId;

/// Versioning metadata for one partition image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSignature {
    /// Partition this signature describes
    pub partition_id: PartitionId,
    /// Fingerprint of the last committed image (empty if none)
    #[serde(default)]
    pub content_fingerprint: Fingerprint,
    /// Extension fields
    #[serde(flatten)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PartitionSignature {
    /// Create a signature for a committed image
    pub fn new(partition_id: PartitionId, content_fingerprint: Fingerprint) -> Self {
        PartitionSignature {
            partition_id,
            content_fingerprint,
            metadata: BTreeMap::new(),
        }
    }

    /// The sentinel returned when a partition has never been saved
    pub fn absent(partition_id: PartitionId) -> Self {
        Self::new(partition_id, Fingerprint::empty())
    }

    /// True if no image has been recorded for this partition
    pub fn is_absent(&self) -> bool {
        self.content_fingerprint.is_empty()
    }

    /// True if this signature describes an image with the given fingerprint
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        !self.is_absent() && &self.content_fingerprint == fingerprint
    }

    /// Attach an extension field (builder pattern)
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Serialize to the stored JSON form
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse the stored JSON form
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
