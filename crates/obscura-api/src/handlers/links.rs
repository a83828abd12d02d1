use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use obscura_core::models::{EphemeralLinkResponse, LinkCreationRequest};

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Mint an ephemeral upload link.
///
/// The expiry comes from `sinceNow` (ISO 8601 duration) or, failing that,
/// `timeExact` (RFC 3339). Links shorter than the minimum validity window
/// are rejected.
#[utoipa::path(
    post,
    path = "/admin/ephemeral-links",
    tag = "admin",
    request_body = LinkCreationRequest,
    responses(
        (status = 200, description = "Link created", body = EphemeralLinkResponse),
        (status = 400, description = "Invalid expiry", body = ErrorResponse),
        (status = 403, description = "Missing or wrong access token", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, req))]
pub async fn create_ephemeral_link(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LinkCreationRequest>,
) -> Result<Json<EphemeralLinkResponse>, HttpAppError> {
    let response = state.ingestion.create_upload_link(req).await?;
    Ok(Json(response))
}
