//! Data repository: LRU caches in front of the structured store.
//!
//! A single consumer owns the three caches and the store handle; callers go
//! through [`DataRepository`], which sends one command per operation and
//! waits for the typed reply. Commands travel over a rendezvous-sized channel
//! so senders park until the consumer is ready, and the consumer handles one
//! command at a time, giving a total order over all cache and store updates.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use obscura_core::models::{ImageMeta, ServiceStats};
use obscura_core::AppError;
use obscura_db::DataStore;
use tokio::sync::{mpsc, oneshot};

/// Expiry assigned to tokens the store knows nothing about: such tokens
/// never expire. See [`DataRepository::is_expired`].
pub const NEVER_EXPIRES: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

enum DataCommand {
    PutToken {
        id: String,
        expiry: DateTime<Utc>,
        ack: oneshot::Sender<()>,
    },
    TokenExpiry {
        id: String,
        reply: oneshot::Sender<DateTime<Utc>>,
    },
    HashToId {
        hash: String,
        reply: oneshot::Sender<Option<String>>,
    },
    AddMeta {
        meta: ImageMeta,
        ack: oneshot::Sender<()>,
    },
    UpdateMeta {
        meta: ImageMeta,
        ack: oneshot::Sender<()>,
    },
    FetchMeta {
        id: String,
        reply: oneshot::Sender<Option<ImageMeta>>,
    },
    FetchStats {
        reply: oneshot::Sender<Result<ServiceStats, AppError>>,
    },
}

/// Handle to the data consumer. Cheap to clone; every method suspends until
/// the consumer has processed the command.
#[derive(Clone)]
pub struct DataRepository {
    tx: mpsc::Sender<DataCommand>,
}

fn consumer_gone<T>(_: T) -> AppError {
    AppError::Internal("data repository consumer is gone".to_string())
}

fn cache_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

impl DataRepository {
    /// Spawn the consumer task and return its handle.
    pub fn spawn(
        link_cache_capacity: usize,
        meta_cache_capacity: usize,
        hash_cache_capacity: usize,
        store: Arc<dyn DataStore>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let consumer = DataConsumer {
            link_cache: LruCache::new(cache_capacity(link_cache_capacity)),
            meta_cache: LruCache::new(cache_capacity(meta_cache_capacity)),
            hash_cache: LruCache::new(cache_capacity(hash_cache_capacity)),
            store,
        };
        tokio::spawn(consumer.run(rx));
        DataRepository { tx }
    }

    /// Bind an upload token to its expiry.
    pub async fn put_token(&self, id: &str, expiry: DateTime<Utc>) -> Result<(), AppError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(DataCommand::PutToken {
                id: id.to_string(),
                expiry,
                ack,
            })
            .await
            .map_err(consumer_gone)?;
        done.await.map_err(consumer_gone)
    }

    /// Whether the upload token has expired. Tokens the service has never
    /// heard of resolve to [`NEVER_EXPIRES`] and therefore pass this check.
    pub async fn is_expired(&self, id: &str) -> Result<bool, AppError> {
        let (reply, result) = oneshot::channel();
        self.tx
            .send(DataCommand::TokenExpiry {
                id: id.to_string(),
                reply,
            })
            .await
            .map_err(consumer_gone)?;
        let expiry = result.await.map_err(consumer_gone)?;
        Ok(Utc::now() >= expiry)
    }

    /// Resolve a content hash to an existing image id, if one is known.
    pub async fn hash_to_id(&self, hash: &str) -> Result<Option<String>, AppError> {
        let (reply, result) = oneshot::channel();
        self.tx
            .send(DataCommand::HashToId {
                hash: hash.to_string(),
                reply,
            })
            .await
            .map_err(consumer_gone)?;
        result.await.map_err(consumer_gone)
    }

    pub async fn add_meta(&self, meta: ImageMeta) -> Result<(), AppError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(DataCommand::AddMeta { meta, ack })
            .await
            .map_err(consumer_gone)?;
        done.await.map_err(consumer_gone)
    }

    pub async fn update_meta(&self, meta: ImageMeta) -> Result<(), AppError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(DataCommand::UpdateMeta { meta, ack })
            .await
            .map_err(consumer_gone)?;
        done.await.map_err(consumer_gone)
    }

    pub async fn fetch_meta(&self, id: &str) -> Result<Option<ImageMeta>, AppError> {
        let (reply, result) = oneshot::channel();
        self.tx
            .send(DataCommand::FetchMeta {
                id: id.to_string(),
                reply,
            })
            .await
            .map_err(consumer_gone)?;
        result.await.map_err(consumer_gone)
    }

    pub async fn fetch_stats(&self) -> Result<ServiceStats, AppError> {
        let (reply, result) = oneshot::channel();
        self.tx
            .send(DataCommand::FetchStats { reply })
            .await
            .map_err(consumer_gone)?;
        result.await.map_err(consumer_gone)?
    }
}

struct DataConsumer {
    link_cache: LruCache<String, DateTime<Utc>>,
    meta_cache: LruCache<String, ImageMeta>,
    hash_cache: LruCache<String, String>,
    store: Arc<dyn DataStore>,
}

impl DataConsumer {
    async fn run(mut self, mut rx: mpsc::Receiver<DataCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd).await;
        }
        tracing::debug!("data repository consumer stopping");
    }

    /// Keep the meta and hash caches coherent: whoever learns about a record
    /// records both directions.
    fn cache_meta(&mut self, meta: ImageMeta) {
        self.hash_cache.put(meta.hash.clone(), meta.id.clone());
        self.meta_cache.put(meta.id.clone(), meta);
    }

    async fn handle(&mut self, cmd: DataCommand) {
        match cmd {
            DataCommand::PutToken { id, expiry, ack } => {
                self.link_cache.put(id.clone(), expiry);
                if let Err(err) = self.store.put_token(&id, expiry).await {
                    tracing::warn!(id, error = %err, "failed to persist upload token");
                }
                let _ = ack.send(());
            }

            DataCommand::TokenExpiry { id, reply } => {
                let expiry = match self.link_cache.get(&id) {
                    Some(expiry) => *expiry,
                    None => match self.store.get_token_expiry(&id).await {
                        Ok(Some(expiry)) => {
                            self.link_cache.put(id, expiry);
                            expiry
                        }
                        Ok(None) => NEVER_EXPIRES,
                        Err(err) => {
                            tracing::warn!(id, error = %err, "token lookup failed");
                            NEVER_EXPIRES
                        }
                    },
                };
                let _ = reply.send(expiry);
            }

            DataCommand::HashToId { hash, reply } => {
                let id = match self.hash_cache.get(&hash) {
                    Some(id) => Some(id.clone()),
                    None => match self.store.get_meta_by_hash(&hash).await {
                        Ok(Some(meta)) => {
                            let id = meta.id.clone();
                            self.cache_meta(meta);
                            Some(id)
                        }
                        Ok(None) => None,
                        Err(err) => {
                            tracing::warn!(hash, error = %err, "hash index lookup failed");
                            None
                        }
                    },
                };
                let _ = reply.send(id);
            }

            DataCommand::AddMeta { meta, ack } => {
                self.cache_meta(meta.clone());
                if let Err(err) = self.store.put_meta(&meta).await {
                    tracing::warn!(id = %meta.id, error = %err, "failed to persist image metadata");
                }
                let _ = ack.send(());
            }

            DataCommand::UpdateMeta { meta, ack } => {
                self.cache_meta(meta.clone());
                if let Err(err) = self.store.update_meta(&meta).await {
                    tracing::warn!(id = %meta.id, error = %err, "failed to update image metadata");
                }
                let _ = ack.send(());
            }

            DataCommand::FetchMeta { id, reply } => {
                let meta = match self.meta_cache.get(&id) {
                    Some(meta) => Some(meta.clone()),
                    None => match self.store.get_meta(&id).await {
                        Ok(Some(meta)) => {
                            self.cache_meta(meta.clone());
                            Some(meta)
                        }
                        Ok(None) => None,
                        Err(err) => {
                            tracing::warn!(id, error = %err, "metadata lookup failed");
                            None
                        }
                    },
                };
                let _ = reply.send(meta);
            }

            DataCommand::FetchStats { reply } => {
                let _ = reply.send(self.store.stats().await);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use obscura_db::NoOpStore;
    use std::sync::Mutex;

    fn repo() -> DataRepository {
        DataRepository::spawn(16, 16, 16, Arc::new(NoOpStore))
    }

    #[tokio::test]
    async fn unknown_tokens_never_expire() {
        let data = repo();
        assert!(!data.is_expired("nobody-minted-this").await.unwrap());
    }

    #[tokio::test]
    async fn tokens_expire_at_their_recorded_instant() {
        let data = repo();
        data.put_token("fresh", Utc::now() + Duration::seconds(60))
            .await
            .unwrap();
        data.put_token("stale", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        assert!(!data.is_expired("fresh").await.unwrap());
        assert!(data.is_expired("stale").await.unwrap());
    }

    #[tokio::test]
    async fn meta_and_hash_caches_stay_coherent() {
        let data = repo();
        let meta = ImageMeta::new(
            "imgA".into(),
            "hashA".into(),
            "image/png".into(),
            42,
            Utc::now(),
        );
        data.add_meta(meta.clone()).await.unwrap();

        let fetched = data.fetch_meta("imgA").await.unwrap().unwrap();
        assert_eq!(fetched.hash, "hashA");
        assert_eq!(data.hash_to_id("hashA").await.unwrap().unwrap(), "imgA");

        let mut updated = fetched;
        updated.camera_model = "PixelCam 9".into();
        data.update_meta(updated).await.unwrap();
        let fetched = data.fetch_meta("imgA").await.unwrap().unwrap();
        assert_eq!(fetched.camera_model, "PixelCam 9");
        assert_eq!(data.hash_to_id("hashA").await.unwrap().unwrap(), "imgA");
    }

    #[tokio::test]
    async fn unknown_hash_resolves_to_absent() {
        let data = repo();
        assert!(data.hash_to_id("no-such-hash").await.unwrap().is_none());
        assert!(data.fetch_meta("no-such-id").await.unwrap().is_none());
    }

    /// Store whose reads answer from a fixed record, to exercise cache
    /// population on miss.
    struct FixedStore {
        meta: ImageMeta,
        reads: Mutex<u32>,
    }

    #[async_trait]
    impl DataStore for FixedStore {
        async fn initialize(&self) -> Result<(), AppError> {
            Ok(())
        }
        async fn put_token(&self, _: &str, _: DateTime<Utc>) -> Result<(), AppError> {
            Ok(())
        }
        async fn get_token_expiry(&self, _: &str) -> Result<Option<DateTime<Utc>>, AppError> {
            Ok(None)
        }
        async fn put_meta(&self, _: &ImageMeta) -> Result<(), AppError> {
            Ok(())
        }
        async fn update_meta(&self, _: &ImageMeta) -> Result<(), AppError> {
            Ok(())
        }
        async fn get_meta(&self, id: &str) -> Result<Option<ImageMeta>, AppError> {
            *self.reads.lock().unwrap() += 1;
            Ok((id == self.meta.id).then(|| self.meta.clone()))
        }
        async fn get_meta_by_hash(&self, hash: &str) -> Result<Option<ImageMeta>, AppError> {
            *self.reads.lock().unwrap() += 1;
            Ok((hash == self.meta.hash).then(|| self.meta.clone()))
        }
        async fn stats(&self) -> Result<ServiceStats, AppError> {
            Ok(ServiceStats::default())
        }
    }

    #[tokio::test]
    async fn store_misses_populate_both_caches() {
        let meta = ImageMeta::new(
            "imgB".into(),
            "hashB".into(),
            "image/jpeg".into(),
            7,
            Utc::now(),
        );
        let store = Arc::new(FixedStore {
            meta,
            reads: Mutex::new(0),
        });
        let data = DataRepository::spawn(16, 16, 16, store.clone());

        // First lookup goes to the store, second is served from cache.
        assert_eq!(data.hash_to_id("hashB").await.unwrap().unwrap(), "imgB");
        assert_eq!(data.hash_to_id("hashB").await.unwrap().unwrap(), "imgB");
        // The by-hash read also primed the meta cache.
        assert!(data.fetch_meta("imgB").await.unwrap().is_some());
        assert_eq!(*store.reads.lock().unwrap(), 1);
    }
}
