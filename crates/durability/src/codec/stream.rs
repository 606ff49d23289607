//! Asynchronous record stream writer/reader over tokio I/O.
//!
//! These are what the checkpoint coordinator streams images through: the
//! writer sits on top of a backend write channel and the reader on top of
//! a read channel. Both buffer internally, so callers can hand them
//! unbuffered channels.

use futures::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use cellsnap_core::{Record, RecordId, TypeTag, TERMINATOR_ID};

use super::format::{
    decode_header, encode_header, read_error, validate_record, CodecError, RECORD_HEADER_SIZE,
};

/// Streams records into an `AsyncWrite` sink
pub struct AsyncRecordWriter<W> {
    inner: BufWriter<W>,
    records: u64,
}

impl<W: AsyncWrite + Unpin> AsyncRecordWriter<W> {
    /// Create a writer over `inner`
    pub fn new(inner: W) -> Self {
        AsyncRecordWriter {
            inner: BufWriter::new(inner),
            records: 0,
        }
    }

    /// Append one record
    pub async fn write_record(&mut self, record: &Record) -> Result<(), CodecError> {
        self.write_parts(record.id, record.type_tag, &record.payload)
            .await
    }

    /// Append one record from its parts
    pub async fn write_parts(
        &mut self,
        id: RecordId,
        type_tag: TypeTag,
        payload: &[u8],
    ) -> Result<(), CodecError> {
        let len = validate_record(id, payload.len())?;
        self.inner
            .write_all(&encode_header(id, type_tag, len))
            .await?;
        self.inner.write_all(payload).await?;
        self.records += 1;
        Ok(())
    }

    /// Number of data records written so far
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Write the terminator, flush, and hand back the sink.
    ///
    /// The sink itself is not shut down; committing it is the caller's job.
    pub async fn finish(mut self) -> Result<W, CodecError> {
        self.inner
            .write_all(&encode_header(TERMINATOR_ID, 0, 0))
            .await?;
        self.inner.flush().await?;
        Ok(self.inner.into_inner())
    }
}

/// Lazily decodes records from an `AsyncRead` source.
///
/// Each call to [`next_record`](Self::next_record) reads exactly one record,
/// so the caller can apply it before the next one is fetched. Returns
/// `Ok(None)` at the terminator and on every call after it (or after the
/// first error).
pub struct AsyncRecordReader<R> {
    inner: BufReader<R>,
    offset: u64,
    finished: bool,
}

impl<R: AsyncRead + Unpin> AsyncRecordReader<R> {
    /// Create a reader over `inner`
    pub fn new(inner: R) -> Self {
        AsyncRecordReader {
            inner: BufReader::new(inner),
            offset: 0,
            finished: false,
        }
    }

    /// Bytes of the stream consumed as records so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next record, or `None` once the terminator is reached
    pub async fn next_record(&mut self) -> Result<Option<Record>, CodecError> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_record().await;
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    /// Hand back the source. Bytes buffered past the last record are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Turn the reader into a `Stream` of records
    pub fn into_stream(self) -> impl Stream<Item = Result<Record, CodecError>> {
        stream::unfold(self, |mut reader| async move {
            match reader.next_record().await {
                Ok(Some(record)) => Some((Ok(record), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        })
    }

    async fn read_record(&mut self) -> Result<Option<Record>, CodecError> {
        let start = self.offset;
        let mut header = [0u8; RECORD_HEADER_SIZE];
        self.inner
            .read_exact(&mut header)
            .await
            .map_err(|e| read_error(e, start))?;
        self.offset += RECORD_HEADER_SIZE as u64;

        let (id, type_tag, len) = decode_header(&header);
        if id == TERMINATOR_ID {
            return Ok(None);
        }

        let mut payload = Vec::new();
        (&mut self.inner)
            .take(u64::from(len))
            .read_to_end(&mut payload)
            .await
            .map_err(|e| read_error(e, start))?;
        if payload.len() < len as usize {
            return Err(CodecError::Truncated { offset: start });
        }
        self.offset += u64::from(len);

        Ok(Some(Record::new(id, type_tag, payload)))
    }
}
