//! Durability layer for cellsnap
//!
//! This crate handles everything that touches durable object storage:
//!
//! - Codec: the partition image record stream (sync and async)
//! - Backend: object storage adapter over the `object_store` crate
//! - Layout: image and signature object naming
//! - Signatures: per-partition JSON metadata objects
//! - Checkpoint: save/restore coordination against the local cell store
//! - Retry: pluggable retry policy with cancellation
//! - Fault injection for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend; // Object storage adapter and fingerprinting channels
pub mod checkpoint; // CheckpointCoordinator
pub mod codec; // Record stream format
pub mod config; // ImageStorageConfig
pub mod error; // CheckpointError
pub mod layout; // {folder}/{p}.image, {folder}/{p}.sig
pub mod retry; // RetryPolicy, FixedBackoff, Retrier
pub mod signature; // SignatureStore
pub mod testing; // FaultyBackend, StallingStore, RecordingPolicy

// === Re-exports ===
pub use backend::{
    BackendError, BackendResult, ObjectBackend, ObjectStoreBackend, ObjectUpload, ReadChannel,
    WriteChannel,
};
pub use checkpoint::CheckpointCoordinator;
pub use codec::{
    decode_records, encode_records, AsyncRecordReader, AsyncRecordWriter, CodecError,
    RecordDecoder, RecordEncoder, MAX_PAYLOAD_LEN, RECORD_HEADER_SIZE,
};
pub use config::{default_connection_limit, ConfigError, ImageStorageConfig, RestoreFailurePolicy};
pub use error::{CheckpointError, CheckpointResult};
pub use layout::{ImageLayout, IMAGE_EXTENSION, SIGNATURE_EXTENSION};
pub use retry::{FixedBackoff, Retrier, RetryDecision, RetryPolicy};
pub use signature::SignatureStore;
pub use tokio_util::sync::CancellationToken;
