//! Domain records and JSON wire shapes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Camera model recorded before (or in the absence of) successful analysis.
pub const UNKNOWN_CAMERA_MODEL: &str = "unknown";

/// Prefix shared by every accepted media type.
pub const IMAGE_MEDIA_PREFIX: &str = "image/";

/// An ephemeral upload token: an opaque id bound to an absolute expiry.
/// Tokens are never mutated; expiry checks compare against the wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadToken {
    pub id: String,
    pub expiry: DateTime<Utc>,
}

/// Metadata for one stored image. Created on first upload of a new content
/// hash, then updated exactly once by the analysis worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub id: String,
    /// Hex-encoded SHA-256 of the full content.
    pub hash: String,
    pub media_type: String,
    pub size: u64,
    pub uploaded: DateTime<Utc>,
    pub camera_model: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ImageMeta {
    /// Record for a freshly uploaded image, before analysis has run.
    pub fn new(
        id: String,
        hash: String,
        media_type: String,
        size: u64,
        uploaded: DateTime<Utc>,
    ) -> Self {
        ImageMeta {
            id,
            hash,
            media_type,
            size,
            uploaded,
            camera_model: UNKNOWN_CAMERA_MODEL.to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    /// Normalize fields the analysis pass may leave unset.
    pub fn apply_defaults(&mut self) {
        if self.camera_model.is_empty() {
            self.camera_model = UNKNOWN_CAMERA_MODEL.to_string();
        }
    }
}

// MARK: Wire shapes.

/// Body of `POST /admin/ephemeral-links`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LinkCreationRequest {
    /// Duration from now, in ISO 8601 duration format (e.g. `P2DT3H`).
    #[serde(rename = "sinceNow", default, skip_serializing_if = "Option::is_none")]
    pub since_now: Option<String>,
    /// Absolute expiry in RFC 3339 format.
    #[serde(rename = "timeExact", default, skip_serializing_if = "Option::is_none")]
    pub time_exact: Option<String>,
}

/// A freshly minted ephemeral upload link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralLinkResponse {
    /// Relative path the uploader should POST to.
    pub relative_path: String,
    /// Timestamp after which the link stops working.
    pub expires_on: String,
}

/// One accepted part of a multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessedImage {
    pub name: String,
    pub id: String,
    /// Hex-encoded SHA-256 of the uploaded bytes.
    pub hash: String,
    pub size: u64,
}

/// Response after uploading one or more images.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ImageUploadResponse {
    pub processed: Vec<ProcessedImage>,
}

/// The media type with the most uploads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PopularFormat {
    pub format: String,
    pub uploads: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CameraModelCount {
    pub model: String,
    pub uploads: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DayCount {
    pub date: NaiveDate,
    pub uploads: u64,
}

/// Aggregate statistics over everything the service has ingested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceStats {
    #[serde(rename = "popularFormat")]
    pub popular_format: PopularFormat,
    /// Up to ten camera models, most uploads first.
    #[serde(rename = "top10CameraModels")]
    pub top_camera_models: Vec<CameraModelCount>,
    /// Per-day upload counts over the trailing 30 days, oldest first.
    #[serde(rename = "uploadFrequency30Days")]
    pub upload_frequency_30_days: Vec<DayCount>,
}
