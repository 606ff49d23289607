//! Checkpoint errors
//!
//! Every failure a save or restore can surface. [`CheckpointError::is_transient`]
//! decides whether the retry loop may repeat the operation.

use cellsnap_core::{PartitionId, RecordId};
use cellsnap_storage::StoreError;

use crate::backend::BackendError;
use crate::codec::CodecError;

/// Result type alias for checkpoint operations
pub type CheckpointResult<T> = std::result::Result<T, CheckpointError>;

/// Errors surfaced by the checkpoint coordinator and signature store
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Object storage failure
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The image could not be decoded
    #[error("Image decode error: {0}")]
    Decode(#[source] CodecError),

    /// A record could not be encoded into the image
    #[error("Image encode error: {0}")]
    Encode(#[source] CodecError),

    /// Restore requested for a partition that was never saved
    #[error("No image for partition {0}")]
    ImageNotFound(PartitionId),

    /// The local store refused a restored record
    #[error("Local store rejected record {id} while restoring partition {partition}: {source}")]
    StoreRejected {
        /// Partition being restored
        partition: PartitionId,
        /// Record the store refused
        id: RecordId,
        /// Store error
        #[source]
        source: StoreError,
    },

    /// A record listed for the partition could not be read from the local store
    #[error("Failed to read record {id} from local store: {source}")]
    StoreRead {
        /// Record being read
        id: RecordId,
        /// Store error
        #[source]
        source: StoreError,
    },

    /// The signature could not be serialized
    #[error("Signature error: {0}")]
    Signature(#[from] cellsnap_core::Error),

    /// The operation was cancelled while waiting to retry
    #[error("Operation on partition {partition} cancelled")]
    Cancelled {
        /// Partition the operation was for
        partition: PartitionId,
    },

    /// The retry policy gave up
    #[error("Gave up on partition {partition} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Partition the operation was for
        partition: PartitionId,
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last_error: Box<CheckpointError>,
    },
}

impl CheckpointError {
    /// True if repeating the whole operation may succeed.
    ///
    /// Backend failures other than a missing object, mid-stream I/O
    /// failures, and everything on the save path are transient. A
    /// malformed image, a store rejection, a missing image, cancellation
    /// and exhausted retries are not.
    pub fn is_transient(&self) -> bool {
        match self {
            CheckpointError::Backend(e) => e.is_transient(),
            CheckpointError::Decode(CodecError::Io(_)) => true,
            CheckpointError::Decode(_) => false,
            CheckpointError::Encode(_) => true,
            CheckpointError::StoreRead { .. } => true,
            CheckpointError::StoreRejected { .. } => false,
            CheckpointError::ImageNotFound(_) => false,
            CheckpointError::Signature(_) => false,
            CheckpointError::Cancelled { .. } => false,
            CheckpointError::RetriesExhausted { .. } => false,
        }
    }
}
