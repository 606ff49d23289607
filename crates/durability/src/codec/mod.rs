//! Record stream codec.
//!
//! An image is the ordered sequence of one partition's records followed by
//! a terminator record with id 0. See [`format`] for the byte layout.
//!
//! Two surfaces share the format:
//!
//! - `RecordEncoder` / `RecordDecoder`: blocking, over `std::io`
//! - `AsyncRecordWriter` / `AsyncRecordReader`: over tokio I/O, used by
//!   the checkpoint coordinator to stream through backend channels
//!
//! Decoding is lazy in both cases: records are produced one at a time and
//! the whole stream is never buffered.
//!
//! # Usage
//!
//! ```ignore
//! use cellsnap_durability::codec::{decode_records, encode_records};
//!
//! let bytes = encode_records(&records)?;
//! for record in decode_records(&bytes) {
//!     let record = record?;
//!     store.write(record.id, record.type_tag, &record.payload)?;
//! }
//! ```

mod blocking;
pub mod format;
mod stream;

pub use blocking::{decode_records, encode_records, RecordDecoder, RecordEncoder};
pub use format::{CodecError, MAX_PAYLOAD_LEN, RECORD_HEADER_SIZE};
pub use stream::{AsyncRecordReader, AsyncRecordWriter};
