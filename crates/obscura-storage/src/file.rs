//! Filesystem-backed object store.
//!
//! One regular file per object at `{root}/{id}`, contents being the raw
//! concatenation of uploaded chunks with no framing.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::chunk::Chunk;
use crate::traits::{ObjectReader, ObjectSource, ObjectStore, StorageError, StorageResult};

/// Read buffer size for streaming an object back out.
pub const READ_BUFFER_SIZE: usize = 512;

/// Object ids come straight from URL path segments; anything that could
/// escape the root directory is rejected before touching the filesystem.
fn validate_id(id: &str) -> StorageResult<()> {
    if id.is_empty() || id.contains('/') || id.contains("..") || id.starts_with('.') {
        return Err(StorageError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Writes and discards go through the owning consumer; `open_writes` is keyed
/// by object id and holds the file handles of in-flight uploads.
pub struct FileStore {
    root: PathBuf,
    open_writes: HashMap<String, fs::File>,
    source: Arc<FileSource>,
}

impl FileStore {
    /// Create the store, making sure the root directory exists.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        let source = Arc::new(FileSource { root: root.clone() });
        Ok(FileStore {
            root,
            open_writes: HashMap::new(),
            source,
        })
    }

    fn object_path(&self, id: &str) -> StorageResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    async fn store_chunk(&mut self, id: &str, bytes: Bytes, is_final: bool) -> StorageResult<()> {
        let path = self.object_path(id)?;

        let file = match self.open_writes.entry(id.to_string()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                let file = fs::File::create(&path).await.map_err(|err| {
                    tracing::error!(id, path = %path.display(), error = %err, "failed to create object file");
                    err
                })?;
                slot.insert(file)
            }
        };

        let result = async {
            if !bytes.is_empty() {
                file.write_all(&bytes).await?;
            }
            if is_final {
                file.flush().await?;
            }
            Ok(())
        }
        .await;

        // Closing the handle is implicit in dropping it.
        if is_final || result.is_err() {
            self.open_writes.remove(id);
        }

        if let Err(err) = &result {
            tracing::error!(id, error = %err, "write to object store failed, releasing handle");
        }
        result.map_err(StorageError::Io)
    }

    fn retrieve_chunks(&self, id: &str, sink: mpsc::Sender<Chunk>) -> BoxFuture<'static, ()> {
        let path = self.object_path(id);
        let id = id.to_string();
        Box::pin(async move {
            let path = match path {
                Ok(path) => path,
                Err(err) => {
                    let _ = sink.send(Chunk::failed(err)).await;
                    return;
                }
            };

            let mut file = match fs::File::open(&path).await {
                Ok(file) => file,
                Err(err) => {
                    tracing::warn!(id, error = %err, "cannot open object for streaming");
                    let _ = sink.send(Chunk::failed(err.into())).await;
                    return;
                }
            };

            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match file.read(&mut buf).await {
                    Ok(0) => {
                        let _ = sink.send(Chunk::terminator()).await;
                        return;
                    }
                    Ok(n) => {
                        let chunk = Chunk::data(Bytes::copy_from_slice(&buf[..n]));
                        if sink.send(chunk).await.is_err() {
                            // Receiver went away; nothing left to stream for.
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(id, error = %err, "read error while streaming object");
                        let _ = sink.send(Chunk::failed(err.into())).await;
                        return;
                    }
                }
            }
        })
    }

    async fn discard(&mut self, id: &str) {
        self.open_writes.remove(id);
        let Ok(path) = self.object_path(id) else {
            return;
        };
        if let Err(err) = fs::remove_file(&path).await {
            tracing::debug!(id, error = %err, "discard could not remove object file");
        }
    }

    fn source(&self) -> Arc<dyn ObjectSource> {
        self.source.clone()
    }
}

/// Read-only companion of [`FileStore`]; carries nothing but the root path,
/// so it can be shared freely.
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    fn object_path(&self, id: &str) -> StorageResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl ObjectSource for FileSource {
    async fn open_reader(&self, id: &str) -> StorageResult<ObjectReader> {
        let path = self.object_path(id)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn release_reader(&self, _id: &str, reader: ObjectReader) {
        drop(reader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    async fn store_in(dir: &Path) -> FileStore {
        FileStore::new(dir).await.unwrap()
    }

    async fn collect(path: &Path) -> Vec<u8> {
        fs::read(path).await.unwrap_or_default()
    }

    #[tokio::test]
    async fn chunks_append_into_a_single_file() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path()).await;

        store
            .store_chunk("img", Bytes::from_static(b"hello "), false)
            .await
            .unwrap();
        store
            .store_chunk("img", Bytes::from_static(b"world"), false)
            .await
            .unwrap();
        store.store_chunk("img", Bytes::new(), true).await.unwrap();

        assert_eq!(collect(&dir.path().join("img")).await, b"hello world");
        assert!(store.open_writes.is_empty());
    }

    #[tokio::test]
    async fn final_chunk_releases_the_handle_for_reuse() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path()).await;

        store
            .store_chunk("img", Bytes::from_static(b"first"), false)
            .await
            .unwrap();
        store.store_chunk("img", Bytes::new(), true).await.unwrap();

        // A new write for the same id starts the file over.
        store
            .store_chunk("img", Bytes::from_static(b"second"), false)
            .await
            .unwrap();
        store.store_chunk("img", Bytes::new(), true).await.unwrap();

        assert_eq!(collect(&dir.path().join("img")).await, b"second");
    }

    #[tokio::test]
    async fn retrieve_streams_data_then_terminator() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path()).await;

        let payload = vec![7u8; READ_BUFFER_SIZE * 2 + 100];
        store
            .store_chunk("img", Bytes::from(payload.clone()), false)
            .await
            .unwrap();
        store.store_chunk("img", Bytes::new(), true).await.unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(store.retrieve_chunks("img", tx));

        let mut collected = Vec::new();
        loop {
            let chunk = rx.recv().await.expect("stream ended without terminator");
            assert!(chunk.err.is_none());
            if chunk.is_final {
                assert!(chunk.bytes.is_empty());
                break;
            }
            assert!(chunk.bytes.len() <= READ_BUFFER_SIZE);
            collected.extend_from_slice(&chunk.bytes);
        }
        assert_eq!(collected, payload);
    }

    #[tokio::test]
    async fn retrieve_missing_object_yields_error_chunk() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(store.retrieve_chunks("nope", tx));

        let chunk = rx.recv().await.unwrap();
        assert!(chunk.is_final);
        assert!(chunk.err.is_some());
    }

    #[tokio::test]
    async fn discard_removes_the_object() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path()).await;

        store
            .store_chunk("img", Bytes::from_static(b"data"), false)
            .await
            .unwrap();
        store.store_chunk("img", Bytes::new(), true).await.unwrap();
        assert!(dir.path().join("img").exists());

        store.discard("img").await;
        assert!(!dir.path().join("img").exists());

        // Discarding again is a quiet no-op.
        store.discard("img").await;
    }

    #[tokio::test]
    async fn reader_sees_the_stored_bytes() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path()).await;

        store
            .store_chunk("img", Bytes::from_static(b"snapshot"), false)
            .await
            .unwrap();
        store.store_chunk("img", Bytes::new(), true).await.unwrap();

        let source = store.source();
        let mut reader = source.open_reader("img").await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        source.release_reader("img", reader).await;
        assert_eq!(buf, b"snapshot");
    }

    #[tokio::test]
    async fn path_traversal_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path()).await;

        let result = store
            .store_chunk("../escape", Bytes::from_static(b"x"), false)
            .await;
        assert!(matches!(result, Err(StorageError::InvalidId(_))));

        let source = store.source();
        assert!(matches!(
            source.open_reader("a/b").await,
            Err(StorageError::InvalidId(_))
        ));
    }
}
