//! Record stream byte format
//!
//! # Layout
//!
//! ```text
//! +-----------+-----------+-------------+------------------+
//! | id: u64   | tag: u16  | len: u32    | payload: len B   |   record 1
//! +-----------+-----------+-------------+------------------+
//! | ...                                                    |
//! +-----------+-----------+-------------+
//! | 0: u64    | 0: u16    | 0: u32      |                     terminator
//! +-----------+-----------+-------------+
//! ```
//!
//! All integers are little-endian. There is no file header; an image is
//! just its records followed by the terminator.

use byteorder::{ByteOrder, LittleEndian};

use cellsnap_core::{RecordId, TypeTag};

/// Size of the fixed part of every record (id + tag + length)
pub const RECORD_HEADER_SIZE: usize = 14;

/// Largest payload a single record can carry
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Encode a record header
pub(crate) fn encode_header(id: RecordId, type_tag: TypeTag, len: u32) -> [u8; RECORD_HEADER_SIZE] {
    let mut bytes = [0u8; RECORD_HEADER_SIZE];
    LittleEndian::write_u64(&mut bytes[0..8], id);
    LittleEndian::write_u16(&mut bytes[8..10], type_tag);
    LittleEndian::write_u32(&mut bytes[10..14], len);
    bytes
}

/// Decode a record header into `(id, type_tag, payload_len)`
pub(crate) fn decode_header(bytes: &[u8; RECORD_HEADER_SIZE]) -> (RecordId, TypeTag, u32) {
    (
        LittleEndian::read_u64(&bytes[0..8]),
        LittleEndian::read_u16(&bytes[8..10]),
        LittleEndian::read_u32(&bytes[10..14]),
    )
}

/// Check a record before it is written, returning its encoded length
pub(crate) fn validate_record(id: RecordId, payload_len: usize) -> Result<u32, CodecError> {
    if id == cellsnap_core::TERMINATOR_ID {
        return Err(CodecError::ReservedRecordId);
    }
    u32::try_from(payload_len).map_err(|_| CodecError::PayloadTooLarge { len: payload_len })
}

/// Map an I/O error from the decoder, treating early EOF as truncation
pub(crate) fn read_error(e: std::io::Error, record_offset: u64) -> CodecError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        CodecError::Truncated {
            offset: record_offset,
        }
    } else {
        CodecError::Io(e)
    }
}

/// Record stream errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Input ended before the terminator record
    #[error("Record stream truncated in record starting at byte {offset}")]
    Truncated {
        /// Byte offset of the record that could not be completed
        offset: u64,
    },

    /// A data record used the terminator id
    #[error("Record id 0 is reserved for the stream terminator")]
    ReservedRecordId,

    /// Payload does not fit the 32-bit length prefix
    #[error("Payload of {len} bytes exceeds the maximum record size")]
    PayloadTooLarge {
        /// Offending payload length
        len: usize,
    },

    /// Underlying reader or writer failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
