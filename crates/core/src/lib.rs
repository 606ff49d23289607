//! Core types for cellsnap
//!
//! This crate defines the value types shared by the storage and
//! durability layers:
//! - RecordId / TypeTag / Record: the unit of storage
//! - PartitionId: shard number
//! - Fingerprint: content hash of an image object
//! - PartitionSignature: per-partition image metadata
//! - Error: serialization errors for the above

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fingerprint;
pub mod signature;
pub mod types;

pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use signature::PartitionSignature;
pub use types::{PartitionId, Record, RecordId, TypeTag, TERMINATOR_ID};
