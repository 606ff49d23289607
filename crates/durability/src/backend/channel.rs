//! Fingerprinting read/write channels
//!
//! Both channels hash every byte that passes through them with SHA-256, so
//! an image's fingerprint is known the moment the last byte is written or
//! read, whatever the backend reports about the object.
//!
//! Either channel can carry an idle limit. Whenever the underlying I/O stays
//! pending for the whole limit without moving a byte, the pending call fails
//! with `io::ErrorKind::TimedOut`, which the coordinator treats as a
//! transient transport failure.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::time::Sleep;
use tracing::warn;

use cellsnap_core::Fingerprint;

use super::BackendResult;

/// An in-progress object upload.
///
/// Shutting the writer down completes the upload. [`abort`](Self::abort)
/// discards it instead, releasing whatever the service holds for it
/// (multipart parts, staged blocks).
#[async_trait]
pub trait ObjectUpload: AsyncWrite + Send + Unpin {
    /// Discard the upload; the previous object, if any, stays in place
    async fn abort(&mut self) -> io::Result<()>;
}

/// Fails a channel that stops making progress
#[derive(Debug, Default)]
struct IdleTimer {
    limit: Option<Duration>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl IdleTimer {
    fn new(limit: Option<Duration>) -> Self {
        IdleTimer { limit, sleep: None }
    }

    /// Pass a ready result through (restarting the clock) or, while the
    /// inner I/O is pending, fail once the limit has elapsed.
    fn guard<T>(
        &mut self,
        cx: &mut Context<'_>,
        name: &str,
        poll: Poll<io::Result<T>>,
    ) -> Poll<io::Result<T>> {
        if poll.is_ready() {
            self.sleep = None;
            return poll;
        }
        let Some(limit) = self.limit else {
            return Poll::Pending;
        };
        let sleep = self
            .sleep
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(limit)));
        ready!(sleep.as_mut().poll(cx));
        self.sleep = None;
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no progress on {} for {} ms", name, limit.as_millis()),
        )))
    }
}

/// Streaming reader over one object
pub struct ReadChannel {
    name: String,
    inner: Pin<Box<dyn AsyncRead + Send>>,
    hasher: Sha256,
    bytes_read: u64,
    idle: IdleTimer,
}

impl ReadChannel {
    /// Wrap a raw reader for object `name`
    pub fn new(name: impl Into<String>, inner: Pin<Box<dyn AsyncRead + Send>>) -> Self {
        ReadChannel {
            name: name.into(),
            inner,
            hasher: Sha256::new(),
            bytes_read: 0,
            idle: IdleTimer::default(),
        }
    }

    /// Fail reads that stay pending for `limit` (builder pattern)
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle = IdleTimer::new(limit);
        self
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes pulled from the object so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Drain whatever is left and return the fingerprint of the whole object
    pub async fn finish(mut self) -> BackendResult<Fingerprint> {
        tokio::io::copy(&mut self, &mut tokio::io::sink()).await?;
        Ok(Fingerprint::from_hasher(self.hasher))
    }
}

impl AsyncRead for ReadChannel {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = this.inner.as_mut().poll_read(cx, buf);
        ready!(this.idle.guard(cx, &this.name, poll))?;
        let fresh = &buf.filled()[before..];
        this.hasher.update(fresh);
        this.bytes_read += fresh.len() as u64;
        Poll::Ready(Ok(()))
    }
}

/// Streaming writer that replaces one object when committed.
///
/// A channel that is not going to be committed should be
/// [`abort`](Self::abort)ed. Dropping it only abandons the upload locally;
/// services that stage multipart uploads keep the staged parts until they
/// expire.
pub struct WriteChannel {
    name: String,
    inner: Box<dyn ObjectUpload>,
    hasher: Sha256,
    bytes_written: u64,
    idle: IdleTimer,
}

impl WriteChannel {
    /// Wrap an upload for object `name`
    pub fn new(name: impl Into<String>, inner: Box<dyn ObjectUpload>) -> Self {
        WriteChannel {
            name: name.into(),
            inner,
            hasher: Sha256::new(),
            bytes_written: 0,
            idle: IdleTimer::default(),
        }
    }

    /// Fail writes, flushes and the commit once they stay pending for
    /// `limit` (builder pattern)
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle = IdleTimer::new(limit);
        self
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Complete the upload and return the fingerprint of the committed bytes.
    ///
    /// A failed commit aborts the upload before returning the error.
    pub async fn commit(mut self) -> BackendResult<Fingerprint> {
        if let Err(e) = self.shutdown().await {
            if let Err(abort_error) = self.inner.abort().await {
                warn!(
                    object = %self.name,
                    error = %abort_error,
                    "Failed to abort upload after failed commit"
                );
            }
            return Err(e.into());
        }
        Ok(Fingerprint::from_hasher(self.hasher))
    }

    /// Discard the upload; the previous object, if any, stays in place
    pub async fn abort(mut self) -> BackendResult<()> {
        self.inner.abort().await?;
        Ok(())
    }
}

impl AsyncWrite for WriteChannel {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut *this.inner).poll_write(cx, buf);
        let n = ready!(this.idle.guard(cx, &this.name, poll))?;
        this.hasher.update(&buf[..n]);
        this.bytes_written += n as u64;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut *this.inner).poll_flush(cx);
        this.idle.guard(cx, &this.name, poll)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut *this.inner).poll_shutdown(cx);
        this.idle.guard(cx, &this.name, poll)
    }
}
