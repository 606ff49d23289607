//! Testing utilities for checkpointing
//!
//! - **FaultyBackend**: wraps a backend and fails its first K calls with a
//!   transient error, cuts image reads off halfway, or hands out uploads
//!   that fail (counting how many get aborted)
//! - **StallingStore**: wraps an `ObjectStore` whose next reads deliver half
//!   the object and then hang
//! - **RecordingPolicy**: wraps a retry policy and counts its decisions
//!
//! # Example
//!
//! ```ignore
//! use cellsnap_durability::testing::{FaultyBackend, RecordingPolicy};
//!
//! let faulty = Arc::new(FaultyBackend::new(inner, 3));
//! let policy = Arc::new(RecordingPolicy::new(Arc::new(config.retry_policy())));
//! let coordinator = CheckpointCoordinator::new(faulty.clone(), store, map, &config)?
//!     .with_retry_policy(policy.clone());
//! coordinator.save_partition(PartitionId(3)).await?;
//! assert_eq!(policy.retries(), 3);
//! ```

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{
    GetOptions, GetResult, GetResultPayload, ListResult, MultipartUpload, ObjectMeta,
    ObjectStore, PutMultipartOpts, PutOptions, PutPayload, PutResult,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

use cellsnap_core::Fingerprint;

use crate::backend::{
    BackendError, BackendResult, ObjectBackend, ObjectUpload, ReadChannel, WriteChannel,
};
use crate::error::CheckpointError;
use crate::retry::{RetryDecision, RetryPolicy};

/// Backend wrapper that injects transient failures.
///
/// Every trait call counts as one operation. While failures remain armed,
/// the call fails with a `ConnectionReset` I/O error and never reaches the
/// wrapped backend.
///
/// Separately, [`interrupt_reads`](Self::interrupt_reads) arms read
/// channels that deliver the first half of the object and then fail, and
/// [`interrupt_writes`](Self::interrupt_writes) arms write channels whose
/// every write fails.
pub struct FaultyBackend {
    inner: Arc<dyn ObjectBackend>,
    failures_remaining: AtomicU32,
    interrupted_reads: AtomicU32,
    interrupted_writes: AtomicU32,
    aborted_uploads: Arc<AtomicU32>,
    calls: AtomicU32,
}

impl FaultyBackend {
    /// Wrap `inner`, failing its first `failures` calls
    pub fn new(inner: Arc<dyn ObjectBackend>, failures: u32) -> Self {
        FaultyBackend {
            inner,
            failures_remaining: AtomicU32::new(failures),
            interrupted_reads: AtomicU32::new(0),
            interrupted_writes: AtomicU32::new(0),
            aborted_uploads: Arc::new(AtomicU32::new(0)),
            calls: AtomicU32::new(0),
        }
    }

    /// Hand out `writes` failing write channels from the next `open_write`s
    pub fn interrupt_writes(&self, writes: u32) {
        self.interrupted_writes.store(writes, Ordering::SeqCst);
    }

    /// Failing write channels that were aborted
    pub fn aborted_uploads(&self) -> u32 {
        self.aborted_uploads.load(Ordering::SeqCst)
    }

    /// Cut off the next `reads` read channels halfway through the object
    pub fn interrupt_reads(&self, reads: u32) {
        self.interrupted_reads.store(reads, Ordering::SeqCst);
    }

    /// Arm `failures` more failing calls
    pub fn fail_next(&self, failures: u32) {
        self.failures_remaining.store(failures, Ordering::SeqCst);
    }

    /// Failures still armed
    pub fn failures_remaining(&self) -> u32 {
        self.failures_remaining.load(Ordering::SeqCst)
    }

    /// Calls made through this wrapper, failed or not
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self, operation: &str) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failures_remaining) {
            Err(BackendError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("injected failure in {}", operation),
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectBackend for FaultyBackend {
    async fn ensure_container(&self) -> BackendResult<()> {
        self.gate("ensure_container")?;
        self.inner.ensure_container().await
    }

    async fn exists(&self, name: &str) -> BackendResult<bool> {
        self.gate("exists")?;
        self.inner.exists(name).await
    }

    async fn read_all(&self, name: &str) -> BackendResult<Bytes> {
        self.gate("read_all")?;
        self.inner.read_all(name).await
    }

    async fn write_all(&self, name: &str, bytes: Bytes) -> BackendResult<Fingerprint> {
        self.gate("write_all")?;
        self.inner.write_all(name, bytes).await
    }

    async fn open_read(&self, name: &str) -> BackendResult<ReadChannel> {
        self.gate("open_read")?;
        if !take_one(&self.interrupted_reads) {
            return self.inner.open_read(name).await;
        }
        let bytes = self.inner.read_all(name).await?;
        let head = bytes.slice(..bytes.len() / 2);
        let reader = io::Cursor::new(head).chain(BrokenTail);
        Ok(ReadChannel::new(name, Box::pin(reader)))
    }

    async fn open_write(&self, name: &str) -> BackendResult<WriteChannel> {
        self.gate("open_write")?;
        if !take_one(&self.interrupted_writes) {
            return self.inner.open_write(name).await;
        }
        let upload = BrokenUpload {
            aborts: Arc::clone(&self.aborted_uploads),
        };
        Ok(WriteChannel::new(name, Box::new(upload)))
    }

    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>> {
        self.gate("list")?;
        self.inner.list(prefix).await
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Reader that fails every read with a connection reset
struct BrokenTail;

impl AsyncRead for BrokenTail {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "injected mid-stream failure",
        )))
    }
}

/// Upload that fails every write with a connection reset
struct BrokenUpload {
    aborts: Arc<AtomicU32>,
}

impl AsyncWrite for BrokenUpload {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "injected upload failure",
        )))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ObjectUpload for BrokenUpload {
    async fn abort(&mut self) -> io::Result<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// `ObjectStore` wrapper whose reads hang partway.
///
/// The next `stalls` `get` calls return the first half of the object as the
/// body and then never yield again, like a connection that stays open
/// after the peer stops sending. Every other call passes through.
#[derive(Debug)]
pub struct StallingStore {
    inner: Arc<dyn ObjectStore>,
    stalls: AtomicU32,
}

impl StallingStore {
    /// Wrap `inner`, stalling its next `stalls` reads
    pub fn new(inner: Arc<dyn ObjectStore>, stalls: u32) -> Self {
        StallingStore {
            inner,
            stalls: AtomicU32::new(stalls),
        }
    }

    /// Arm `stalls` more stalled reads
    pub fn stall_next(&self, stalls: u32) {
        self.stalls.store(stalls, Ordering::SeqCst);
    }

    /// Stalled reads still armed
    pub fn stalls_remaining(&self) -> u32 {
        self.stalls.load(Ordering::SeqCst)
    }
}

impl fmt::Display for StallingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StallingStore({})", self.inner)
    }
}

#[async_trait]
impl ObjectStore for StallingStore {
    async fn put_opts(
        &self,
        location: &ObjectPath,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &ObjectPath,
        opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &ObjectPath,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        let result = self.inner.get_opts(location, options).await?;
        if !take_one(&self.stalls) {
            return Ok(result);
        }

        let meta = result.meta.clone();
        let range = result.range.clone();
        let attributes = result.attributes.clone();
        let bytes = result.bytes().await?;
        let head = bytes.slice(..bytes.len() / 2);
        let body = stream::once(async move { Ok::<_, object_store::Error>(head) })
            .chain(stream::pending())
            .boxed();
        Ok(GetResult {
            payload: GetResultPayload::Stream(body),
            meta,
            range,
            attributes,
        })
    }

    async fn delete(&self, location: &ObjectPath) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&ObjectPath>) -> BoxStream<'_, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(
        &self,
        prefix: Option<&ObjectPath>,
    ) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &ObjectPath, to: &ObjectPath) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(
        &self,
        from: &ObjectPath,
        to: &ObjectPath,
    ) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

/// Retry policy wrapper that counts decisions
pub struct RecordingPolicy {
    inner: Arc<dyn RetryPolicy>,
    retries: AtomicU32,
    give_ups: AtomicU32,
}

impl RecordingPolicy {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn RetryPolicy>) -> Self {
        RecordingPolicy {
            inner,
            retries: AtomicU32::new(0),
            give_ups: AtomicU32::new(0),
        }
    }

    /// Number of `RetryAfter` decisions made
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    /// Number of `GiveUp` decisions made
    pub fn give_ups(&self) -> u32 {
        self.give_ups.load(Ordering::SeqCst)
    }
}

impl RetryPolicy for RecordingPolicy {
    fn decide(&self, attempt: u32, error: &CheckpointError) -> RetryDecision {
        let decision = self.inner.decide(attempt, error);
        match decision {
            RetryDecision::RetryAfter(_) => self.retries.fetch_add(1, Ordering::SeqCst),
            RetryDecision::GiveUp => self.give_ups.fetch_add(1, Ordering::SeqCst),
        };
        decision
    }
}
