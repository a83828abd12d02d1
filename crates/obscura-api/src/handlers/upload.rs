use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use obscura_core::models::ImageUploadResponse;
use obscura_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Accept a multipart image upload through an ephemeral link.
///
/// Parts without an `image/*` content type are skipped. Identical content is
/// deduplicated: re-uploads come back with the id of the already stored
/// image.
#[utoipa::path(
    post,
    path = "/uploads/{id}",
    tag = "images",
    params(("id" = String, Path, description = "Upload link token")),
    responses(
        (status = 200, description = "Upload processed", body = ImageUploadResponse),
        (status = 400, description = "Body is not multipart", body = ErrorResponse),
        (status = 404, description = "Unknown or expired link", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageUploadResponse>, HttpAppError> {
    let multipart =
        multipart.map_err(|rejection| AppError::MalformedBody(rejection.body_text()))?;

    let response = state.ingestion.process_upload(&link_id, multipart).await?;
    Ok(Json(response))
}
