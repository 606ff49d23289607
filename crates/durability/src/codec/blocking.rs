//! Synchronous record stream encoder/decoder over `std::io`.

use std::io::{Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use cellsnap_core::{Record, RecordId, TypeTag, TERMINATOR_ID};

use super::format::{decode_header, read_error, validate_record, CodecError, RECORD_HEADER_SIZE};

/// Writes records to a `Write` sink
pub struct RecordEncoder<W: Write> {
    inner: W,
    records: u64,
}

impl<W: Write> RecordEncoder<W> {
    /// Create an encoder over `inner`
    pub fn new(inner: W) -> Self {
        RecordEncoder { inner, records: 0 }
    }

    /// Append one record
    pub fn write_record(
        &mut self,
        id: RecordId,
        type_tag: TypeTag,
        payload: &[u8],
    ) -> Result<(), CodecError> {
        let len = validate_record(id, payload.len())?;
        self.inner.write_u64::<LittleEndian>(id)?;
        self.inner.write_u16::<LittleEndian>(type_tag)?;
        self.inner.write_u32::<LittleEndian>(len)?;
        self.inner.write_all(payload)?;
        self.records += 1;
        Ok(())
    }

    /// Number of data records written so far
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Write the terminator, flush, and hand back the sink
    pub fn finish(mut self) -> Result<W, CodecError> {
        self.inner.write_u64::<LittleEndian>(TERMINATOR_ID)?;
        self.inner.write_u16::<LittleEndian>(0)?;
        self.inner.write_u32::<LittleEndian>(0)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Encode a complete record stream into a buffer
pub fn encode_records(records: &[Record]) -> Result<Vec<u8>, CodecError> {
    let capacity = records
        .iter()
        .map(|r| RECORD_HEADER_SIZE + r.payload.len())
        .sum::<usize>()
        + RECORD_HEADER_SIZE;
    let mut encoder = RecordEncoder::new(Vec::with_capacity(capacity));
    for record in records {
        encoder.write_record(record.id, record.type_tag, &record.payload)?;
    }
    encoder.finish()
}

/// Lazily decodes records from a `Read` source.
///
/// Yields one record per `next()` and stops at the terminator. The
/// iterator is fused: after the terminator or the first error it only
/// returns `None`. It cannot be rewound; decode again from the start to
/// replay.
pub struct RecordDecoder<R: Read> {
    inner: R,
    offset: u64,
    finished: bool,
}

impl<R: Read> RecordDecoder<R> {
    /// Create a decoder over `inner`
    pub fn new(inner: R) -> Self {
        RecordDecoder {
            inner,
            offset: 0,
            finished: false,
        }
    }

    /// Bytes consumed so far, including the terminator once reached
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Give back the underlying reader, positioned after the last consumed byte
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_record(&mut self) -> Result<Option<Record>, CodecError> {
        let start = self.offset;
        let mut header = [0u8; RECORD_HEADER_SIZE];
        self.inner
            .read_exact(&mut header)
            .map_err(|e| read_error(e, start))?;
        self.offset += RECORD_HEADER_SIZE as u64;

        let (id, type_tag, len) = decode_header(&header);
        if id == TERMINATOR_ID {
            return Ok(None);
        }

        // Grow the buffer only as bytes arrive
        let mut payload = Vec::new();
        (&mut self.inner)
            .take(u64::from(len))
            .read_to_end(&mut payload)
            .map_err(|e| read_error(e, start))?;
        if payload.len() < len as usize {
            return Err(CodecError::Truncated { offset: start });
        }
        self.offset += u64::from(len);

        Ok(Some(Record::new(id, type_tag, payload)))
    }
}

impl<R: Read> Iterator for RecordDecoder<R> {
    type Item = Result<Record, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for RecordDecoder<R> {}

/// Decode records from an in-memory buffer
pub fn decode_records(bytes: &[u8]) -> RecordDecoder<&[u8]> {
    RecordDecoder::new(bytes)
}
