//! Application state shared with every handler.

use std::sync::Arc;

use obscura_core::Config;

use crate::repository::DataRepository;
use crate::services::IngestionService;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: IngestionService,
    /// Kept alongside the service for admin queries and operational tooling.
    pub data: DataRepository,
    pub config: Arc<Config>,
}

fn _assert_state_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppState>();
}
