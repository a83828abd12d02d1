//! Shared test harness: a real router over the no-op data store and a
//! temporary file store.

// Each integration test binary compiles its own copy; not every test uses
// every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use obscura_api::setup::initialize_app;
use obscura_api::state::AppState;
use obscura_core::Config;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

pub const TEST_ACCESS_TOKEN: &str = "test-secret";

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub store_dir: TempDir,
}

pub async fn setup_test_app() -> TestApp {
    let store_dir = tempfile::tempdir().expect("tempdir");
    let config = Config {
        access_token: TEST_ACCESS_TOKEN.to_string(),
        postgres_url: None,
        store_path: store_dir.path().to_string_lossy().into_owned(),
        port: 0,
        link_cache_capacity: 64,
        meta_cache_capacity: 64,
        hash_cache_capacity: 64,
    };

    let (state, router) = initialize_app(config).await.expect("app initializes");
    TestApp {
        server: TestServer::new(router).expect("test server"),
        state,
        store_dir,
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Number of regular files currently in the object store.
pub fn stored_object_count(app: &TestApp) -> usize {
    std::fs::read_dir(app.store_dir.path())
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}
