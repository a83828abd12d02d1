//! Route configuration.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::{require_access_token, AuthState};
use crate::handlers;
use crate::services::ingestion::UPLOAD_PATH_PREFIX;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_state = Arc::new(AuthState {
        access_token: state.config.access_token.clone(),
    });

    // Endpoints that require the access token live behind the auth layer.
    let admin = Router::new()
        .route(
            "/admin/ephemeral-links",
            post(handlers::links::create_ephemeral_link),
        )
        .route("/admin/stats", get(handlers::stats::service_stats))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            require_access_token,
        ));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api-doc/openapi.json",
            get(crate::api_doc::serve_openapi),
        )
        .route(
            // The pipeline streams; no point buffering whole bodies here.
            &format!("{}/:id", UPLOAD_PATH_PREFIX),
            post(handlers::upload::upload_images).layer(DefaultBodyLimit::disable()),
        )
        .route("/images/:id", get(handlers::download::download_image))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
