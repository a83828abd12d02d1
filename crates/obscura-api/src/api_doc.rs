//! OpenAPI documentation.

use axum::Json;
use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use obscura_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Obscura API",
        version = "0.1.0",
        description = "Image ingestion and retrieval behind ephemeral, time-limited upload links. \
                       Uploads stream straight into content-addressed storage and are deduplicated \
                       by SHA-256; metadata is enriched asynchronously."
    ),
    paths(
        handlers::links::create_ephemeral_link,
        handlers::upload::upload_images,
        handlers::download::download_image,
        handlers::stats::service_stats,
    ),
    components(schemas(
        models::LinkCreationRequest,
        models::EphemeralLinkResponse,
        models::ProcessedImage,
        models::ImageUploadResponse,
        models::PopularFormat,
        models::CameraModelCount,
        models::DayCount,
        models::ServiceStats,
        error::ErrorResponse,
    ))
)]
pub struct ApiDoc;

pub async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
