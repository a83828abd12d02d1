//! Application wiring: stores, repository consumers, service, routes.

pub mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use obscura_core::Config;
use obscura_storage::FileStore;

use crate::repository::{DataRepository, ObjectsRepository};
use crate::services::IngestionService;
use crate::state::AppState;

/// Bring up the whole application: select and initialize the stores, spawn
/// the repository consumers, and build the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let data_store = obscura_db::create_data_store(config.postgres_url.as_deref())
        .await
        .context("initializing data store")?;

    tracing::info!(path = %config.store_path, "initializing file store for images");
    let object_store = FileStore::new(&config.store_path)
        .await
        .context("initializing object store")?;

    let data = DataRepository::spawn(
        config.link_cache_capacity,
        config.meta_cache_capacity,
        config.hash_cache_capacity,
        data_store,
    );
    let objects = ObjectsRepository::spawn(Box::new(object_store), data.clone());
    let ingestion = IngestionService::new(data.clone(), objects);

    let state = Arc::new(AppState {
        ingestion,
        data,
        config: Arc::new(config),
    });

    let router = routes::build_router(state.clone());
    Ok((state, router))
}
