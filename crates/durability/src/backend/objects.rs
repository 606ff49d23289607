//! `object_store`-backed implementation of [`ObjectBackend`].
//!
//! One adapter covers every backend the `object_store` crate supports. The
//! in-memory and local-filesystem stores are built here; cloud stores
//! (S3, Azure, GCS) are built by the caller with their own credentials and
//! handed to [`ObjectStoreBackend::new`].
//!
//! The adapter applies two pieces of configuration:
//! - connection concurrency, via `object_store::limit::LimitStore`
//! - an optional per-request execution time limit. Whole-object calls run
//!   under `tokio::time::timeout`; streaming channels apply it as an idle
//!   limit to every read, write and the final commit, so a body that stops
//!   arriving (or a part upload that never completes) still fails.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::buffered::BufWriter;
use object_store::limit::LimitStore;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tokio_util::io::StreamReader;
use tracing::debug;

use cellsnap_core::Fingerprint;

use super::{
    BackendError, BackendResult, ObjectBackend, ObjectUpload, ReadChannel, WriteChannel,
};
use crate::config::ImageStorageConfig;

/// Object backend over an `Arc<dyn ObjectStore>`
#[derive(Debug)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    /// Directory to create before writes (local filesystem only)
    local_root: Option<PathBuf>,
    request_timeout: Option<Duration>,
}

impl ObjectStoreBackend {
    /// Wrap a caller-built store.
    ///
    /// The store's container/bucket is expected to exist already, so
    /// `ensure_container` is a no-op.
    pub fn new(store: Arc<dyn ObjectStore>, config: &ImageStorageConfig) -> Self {
        let limited: Arc<dyn ObjectStore> =
            Arc::new(LimitStore::new(store, config.connection_limit));
        ObjectStoreBackend {
            store: limited,
            local_root: None,
            request_timeout: config.request_timeout,
        }
    }

    /// Backend over a fresh in-memory store
    pub fn in_memory(config: &ImageStorageConfig) -> Self {
        Self::new(Arc::new(InMemory::new()), config)
    }

    /// Backend over a local directory, created if missing
    pub fn local(root: impl Into<PathBuf>, config: &ImageStorageConfig) -> BackendResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let fs = LocalFileSystem::new_with_prefix(&root)?;

        let mut backend = Self::new(Arc::new(fs), config);
        backend.local_root = Some(root);
        Ok(backend)
    }

    async fn timed<T, F>(&self, operation: F) -> BackendResult<T>
    where
        F: Future<Output = object_store::Result<T>> + Send,
    {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| BackendError::Timeout {
                    millis: limit.as_millis() as u64,
                })?
                .map_err(BackendError::from),
            None => operation.await.map_err(BackendError::from),
        }
    }
}

#[async_trait]
impl ObjectBackend for ObjectStoreBackend {
    async fn ensure_container(&self) -> BackendResult<()> {
        if let Some(root) = &self.local_root {
            tokio::fs::create_dir_all(root).await?;
            debug!(root = %root.display(), "Ensured image container directory");
        }
        Ok(())
    }

    async fn exists(&self, name: &str) -> BackendResult<bool> {
        match self.timed(self.store.head(&ObjectPath::from(name))).await {
            Ok(_) => Ok(true),
            Err(BackendError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn read_all(&self, name: &str) -> BackendResult<Bytes> {
        let path = ObjectPath::from(name);
        let result = self
            .timed(self.store.get(&path))
            .await
            .map_err(|e| not_found_as(e, name))?;
        self.timed(result.bytes()).await
    }

    async fn write_all(&self, name: &str, bytes: Bytes) -> BackendResult<Fingerprint> {
        self.ensure_container().await?;
        let fingerprint = Fingerprint::of(&bytes);
        self.timed(
            self.store
                .put(&ObjectPath::from(name), PutPayload::from(bytes)),
        )
        .await?;
        debug!(object = name, %fingerprint, "Object written");
        Ok(fingerprint)
    }

    async fn open_read(&self, name: &str) -> BackendResult<ReadChannel> {
        let path = ObjectPath::from(name);
        let result = self
            .timed(self.store.get(&path))
            .await
            .map_err(|e| not_found_as(e, name))?;
        let stream = result
            .into_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        Ok(ReadChannel::new(name, Box::pin(StreamReader::new(stream)))
            .with_idle_timeout(self.request_timeout))
    }

    async fn open_write(&self, name: &str) -> BackendResult<WriteChannel> {
        self.ensure_container().await?;
        let writer = BufWriter::new(Arc::clone(&self.store), ObjectPath::from(name));
        Ok(WriteChannel::new(name, Box::new(writer)).with_idle_timeout(self.request_timeout))
    }

    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>> {
        let prefix = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));
        let names = self
            .store
            .list(prefix.as_ref())
            .map_ok(|meta| meta.location.to_string())
            .try_collect::<Vec<_>>();
        self.timed(names).await
    }
}

#[async_trait]
impl ObjectUpload for BufWriter {
    async fn abort(&mut self) -> io::Result<()> {
        BufWriter::abort(self)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// Report a missing object under its logical name rather than the store's path
fn not_found_as(e: BackendError, name: &str) -> BackendError {
    match e {
        BackendError::NotFound(_) => BackendError::NotFound(name.to_string()),
        other => other,
    }
}
