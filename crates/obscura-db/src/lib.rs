//! Structured persistence for the Obscura image service.
//!
//! The [`DataStore`] trait covers upload tokens, image metadata, the by-hash
//! index and the aggregate statistics query. Two backends exist: PostgreSQL
//! via sqlx, and a no-op store for deployments without a database (the
//! service then runs cache-only and statistics come back empty).

pub mod noop;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use obscura_core::models::{ImageMeta, ServiceStats};
use obscura_core::AppError;

pub use noop::NoOpStore;
pub use postgres::PostgresStore;

/// Persistence layer for adding, mutating and querying structured data.
/// Lookup misses are `Ok(None)`, never errors.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Ensure schemas and tables exist.
    async fn initialize(&self) -> Result<(), AppError>;

    async fn put_token(&self, id: &str, expiry: DateTime<Utc>) -> Result<(), AppError>;

    async fn get_token_expiry(&self, id: &str) -> Result<Option<DateTime<Utc>>, AppError>;

    async fn put_meta(&self, meta: &ImageMeta) -> Result<(), AppError>;

    async fn update_meta(&self, meta: &ImageMeta) -> Result<(), AppError>;

    async fn get_meta(&self, id: &str) -> Result<Option<ImageMeta>, AppError>;

    async fn get_meta_by_hash(&self, hash: &str) -> Result<Option<ImageMeta>, AppError>;

    async fn stats(&self) -> Result<ServiceStats, AppError>;
}

/// Select and initialize a data store from the optional database URL.
/// Absence of a URL selects the no-op backend.
pub async fn create_data_store(postgres_url: Option<&str>) -> Result<Arc<dyn DataStore>, AppError> {
    let store: Arc<dyn DataStore> = match postgres_url {
        Some(url) => {
            tracing::info!("initializing PostgreSQL driver for metadata");
            Arc::new(PostgresStore::connect(url).await?)
        }
        None => {
            tracing::info!("initializing no-op store for metadata");
            Arc::new(NoOpStore)
        }
    };
    store.initialize().await?;
    Ok(store)
}
