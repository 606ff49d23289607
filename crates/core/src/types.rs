//! Identifier and record types shared by every layer.
//!
//! - `RecordId`: 64-bit record identifier (0 is reserved as end-of-stream)
//! - `TypeTag`: 16-bit schema type of a record payload
//! - `PartitionId`: number of a disjoint shard of the record space
//! - `Record`: an identified, typed byte payload

use serde::{Deserialize, Serialize};
use std::fmt;

/// Record identifier.
///
/// Identifiers are allocated upstream and are never zero; the image
/// format uses id 0 as its end-of-stream marker.
pub type RecordId = u64;

/// Schema type tag attached to every record payload.
pub type TypeTag = u16;

/// The id reserved for the image terminator record.
pub const TERMINATOR_ID: RecordId = 0;

/// Partition number.
///
/// Serialized as a bare integer so signature objects stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// Create a partition id from its number
    pub const fn new(id: u32) -> Self {
        PartitionId(id)
    }

    /// The raw partition number
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for PartitionId {
    fn from(id: u32) -> Self {
        PartitionId(id)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single record as it travels through an image.
///
/// The local cell store owns records; this type only carries one while
/// it is being encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record identifier (nonzero for real records)
    pub id: RecordId,
    /// Payload schema type
    pub type_tag: TypeTag,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl Record {
    /// Create a new record
    pub fn new(id: RecordId, type_tag: TypeTag, payload: impl Into<Vec<u8>>) -> Self {
        Record {
            id,
            type_tag,
            payload: payload.into(),
        }
    }

    /// True if this is the end-of-stream marker
    pub fn is_terminator(&self) -> bool {
        self.id == TERMINATOR_ID
    }
}
