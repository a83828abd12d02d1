//! Storage abstraction traits.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::chunk::Chunk;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object id: {0}")]
    InvalidId(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Random-access read handle for out-of-band consumers.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Read-only view of a store, safe to share across tasks. Used by the
/// analysis worker, which re-reads stored bytes while the write half stays
/// confined to its own consumer.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Open a reader over the full object. Pair every call with
    /// [`release_reader`](Self::release_reader).
    async fn open_reader(&self, id: &str) -> StorageResult<ObjectReader>;

    /// Return a reader obtained from [`open_reader`](Self::open_reader).
    async fn release_reader(&self, id: &str, reader: ObjectReader);
}

/// Byte-level persistence: append-only chunked writes, streaming reads and
/// best-effort discard.
///
/// The write half (`store_chunk`, `discard`) mutates an open-handle map that
/// is not safe for concurrent access; a single owning task must serialize
/// those calls. Reads are independent of the handle map and run wherever the
/// returned future is spawned.
#[async_trait]
pub trait ObjectStore: Send {
    /// Append `bytes` to the object `id`, creating it on first call. A final
    /// chunk (or a write error) closes and releases the handle.
    async fn store_chunk(&mut self, id: &str, bytes: Bytes, is_final: bool) -> StorageResult<()>;

    /// Build the job that streams the object's chunks into `sink`. The last
    /// chunk delivered is always final: empty on success, carrying the error
    /// otherwise. The caller decides where the job runs.
    fn retrieve_chunks(&self, id: &str, sink: mpsc::Sender<Chunk>) -> BoxFuture<'static, ()>;

    /// Best-effort removal of the object and any open write handle for it.
    async fn discard(&mut self, id: &str);

    /// Shareable read-only view of this store.
    fn source(&self) -> Arc<dyn ObjectSource>;
}
