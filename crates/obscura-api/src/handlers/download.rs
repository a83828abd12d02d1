use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::{StreamExt, TryStreamExt};
use obscura_core::AppError;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Stream a stored image back to the caller.
///
/// The content type comes from the stored metadata, not from the bytes. The
/// first chunk is verified before the response starts, so a missing object
/// surfaces as a 500 rather than an empty body.
#[utoipa::path(
    get,
    path = "/images/{id}",
    tag = "images",
    params(("id" = String, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image bytes", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown image", body = ErrorResponse),
        (status = 500, description = "Stream failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn download_image(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<String>,
) -> Result<Response, HttpAppError> {
    let (meta, first, rest) = state.ingestion.open_download(&image_id).await?;

    let body_stream = futures::stream::iter(std::iter::once(first))
        .chain(ReceiverStream::new(rest))
        .map(|chunk| match chunk.err {
            Some(err) => Err(std::io::Error::other(format!("stream error: {}", err))),
            None => Ok(chunk),
        })
        .try_take_while(|chunk| futures::future::ready(Ok(!chunk.is_final)))
        .map_ok(|chunk| chunk.bytes);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, meta.media_type)
        .body(Body::from_stream(body_stream))
        .map_err(|err| {
            tracing::error!(error = %err, "failed to build download response");
            HttpAppError(AppError::Internal(err.to_string()))
        })
}
