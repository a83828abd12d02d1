//! No-op data store.
//!
//! Used when no database is configured: writes succeed silently, reads come
//! back empty. Uploads still work because deduplication and token checks fall
//! back to the in-process caches; statistics are empty.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use obscura_core::models::{ImageMeta, ServiceStats};
use obscura_core::AppError;

use crate::DataStore;

pub struct NoOpStore;

#[async_trait]
impl DataStore for NoOpStore {
    async fn initialize(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn put_token(&self, _id: &str, _expiry: DateTime<Utc>) -> Result<(), AppError> {
        Ok(())
    }

    async fn get_token_expiry(&self, _id: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(None)
    }

    async fn put_meta(&self, _meta: &ImageMeta) -> Result<(), AppError> {
        Ok(())
    }

    async fn update_meta(&self, _meta: &ImageMeta) -> Result<(), AppError> {
        Ok(())
    }

    async fn get_meta(&self, _id: &str) -> Result<Option<ImageMeta>, AppError> {
        Ok(None)
    }

    async fn get_meta_by_hash(&self, _hash: &str) -> Result<Option<ImageMeta>, AppError> {
        Ok(None)
    }

    async fn stats(&self) -> Result<ServiceStats, AppError> {
        Ok(ServiceStats::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_are_absent_and_writes_succeed() {
        let store = NoOpStore;
        store.initialize().await.unwrap();
        store.put_token("tok", Utc::now()).await.unwrap();
        assert!(store.get_token_expiry("tok").await.unwrap().is_none());

        let meta = ImageMeta::new(
            "img".into(),
            "hash".into(),
            "image/png".into(),
            10,
            Utc::now(),
        );
        store.put_meta(&meta).await.unwrap();
        assert!(store.get_meta("img").await.unwrap().is_none());
        assert!(store.get_meta_by_hash("hash").await.unwrap().is_none());

        assert_eq!(store.stats().await.unwrap(), ServiceStats::default());
    }
}
