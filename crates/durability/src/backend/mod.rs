//! Durable object storage adapter.
//!
//! The checkpoint coordinator talks to remote storage only through
//! [`ObjectBackend`]: existence checks, whole-object reads and writes, and
//! streaming read/write channels. Implementations never retry; retry
//! policy belongs to the coordinator, which knows that every write it
//! issues is a full-object overwrite and therefore safe to repeat.
//!
//! # Containers
//!
//! Backends that need a namespace or container to exist before writing
//! create it in [`ObjectBackend::ensure_container`]. The call must be
//! idempotent; callers issue it before every write.

mod channel;
mod objects;

pub use channel::{ObjectUpload, ReadChannel, WriteChannel};
pub use objects::ObjectStoreBackend;

use async_trait::async_trait;
use bytes::Bytes;

use cellsnap_core::Fingerprint;

/// Result type alias for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Uniform operations over a durable object namespace
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Create the namespace/container if it does not exist yet
    async fn ensure_container(&self) -> BackendResult<()>;

    /// True if an object with this name exists
    async fn exists(&self, name: &str) -> BackendResult<bool>;

    /// Read a whole object. Missing objects are `BackendError::NotFound`.
    async fn read_all(&self, name: &str) -> BackendResult<Bytes>;

    /// Replace an object with `bytes`, returning the committed fingerprint
    async fn write_all(&self, name: &str, bytes: Bytes) -> BackendResult<Fingerprint>;

    /// Open a streaming reader on an object
    async fn open_read(&self, name: &str) -> BackendResult<ReadChannel>;

    /// Open a streaming writer that replaces an object on commit
    async fn open_write(&self, name: &str) -> BackendResult<WriteChannel>;

    /// Names of all objects under `prefix`
    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>>;
}

/// Object storage errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The named object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// A request exceeded the configured execution time limit
    #[error("Request timed out after {millis} ms")]
    Timeout {
        /// Configured limit in milliseconds
        millis: u64,
    },

    /// The storage service reported an error
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Transport or local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// True if repeating the operation may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, BackendError::NotFound(_))
    }

    /// True for a missing object
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

impl From<object_store::Error> for BackendError {
    fn from(e: object_store::Error) -> Self {
        match e {
            object_store::Error::NotFound { path, .. } => BackendError::NotFound(path),
            other => BackendError::ObjectStore(other.to_string()),
        }
    }
}
