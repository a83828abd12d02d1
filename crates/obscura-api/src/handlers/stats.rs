use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use obscura_core::models::ServiceStats;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Aggregate service statistics: the most popular format, the top camera
/// models and the upload frequency over the trailing 30 days.
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "admin",
    responses(
        (status = 200, description = "Service statistics", body = ServiceStats),
        (status = 403, description = "Missing or wrong access token", body = ErrorResponse),
        (status = 500, description = "Statistics query failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn service_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ServiceStats>, HttpAppError> {
    let stats = state.ingestion.fetch_stats().await?;
    Ok(Json(stats))
}
