//! Ingestion service: upload-link minting, the upload streaming loop and the
//! download stream hand-off.

use axum::extract::multipart::{Field, Multipart};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use obscura_core::models::{
    EphemeralLinkResponse, ImageMeta, ImageUploadResponse, LinkCreationRequest, ProcessedImage,
    IMAGE_MEDIA_PREFIX,
};
use obscura_core::token::{generate_token, TOKEN_LENGTH};
use obscura_core::AppError;
use obscura_storage::Chunk;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::repository::{DataRepository, ObjectsRepository};

/// Path prefix of ephemeral upload links.
pub const UPLOAD_PATH_PREFIX: &str = "/uploads";

/// Links must be valid for at least this long.
const MIN_EXPIRY_SECONDS: i64 = 30;

/// Upload copies are cut to at most this many bytes before hashing and
/// forwarding, so the pipeline never holds whole images in memory.
const UPLOAD_BUFFER_SIZE: usize = 512;

#[derive(Clone)]
pub struct IngestionService {
    data: DataRepository,
    objects: ObjectsRepository,
}

impl IngestionService {
    pub fn new(data: DataRepository, objects: ObjectsRepository) -> Self {
        IngestionService { data, objects }
    }

    /// Validate the link request, mint a token and persist its expiry.
    ///
    /// The duration is tried first; a parseable absolute timestamp is the
    /// fallback. Anything else, or an expiry closer than the minimum window,
    /// is rejected.
    pub async fn create_upload_link(
        &self,
        req: LinkCreationRequest,
    ) -> Result<EphemeralLinkResponse, AppError> {
        let now = Utc::now();
        let mut expiry: Option<DateTime<Utc>> = None;

        if let Some(duration) = req.since_now.as_deref() {
            if let Ok(period) = iso8601_duration::Duration::parse(duration) {
                expiry = Some(now + period.to_chrono_at_datetime(now));
            }
        }

        if expiry.is_none() {
            if let Some(timestamp) = req.time_exact.as_deref() {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
                    expiry = Some(parsed.with_timezone(&Utc));
                }
            }
        }

        let expiry = expiry.ok_or(AppError::InvalidExpiry)?;
        if expiry - now < chrono::Duration::seconds(MIN_EXPIRY_SECONDS) {
            return Err(AppError::InvalidExpiry);
        }

        let link_id = generate_token(TOKEN_LENGTH);
        self.data.put_token(&link_id, expiry).await?;

        Ok(EphemeralLinkResponse {
            relative_path: format!("{}/{}", UPLOAD_PATH_PREFIX, link_id),
            expires_on: expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// Validate the upload token and stream every image part from the
    /// multipart reader into the object store, deduplicating by content hash.
    pub async fn process_upload(
        &self,
        link_id: &str,
        mut multipart: Multipart,
    ) -> Result<ImageUploadResponse, AppError> {
        if self.data.is_expired(link_id).await? {
            return Err(AppError::InvalidUploadId);
        }

        let mut response = ImageUploadResponse::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(err) => return Err(AppError::MalformedBody(err.to_string())),
            };

            // Ignore parts that don't declare an image content type. The
            // claimed type is only provisional either way: analysis later
            // re-derives it from the magic bytes.
            let Some(content_type) = field.content_type().map(str::to_owned) else {
                continue;
            };
            if !content_type.starts_with(IMAGE_MEDIA_PREFIX) {
                continue;
            }

            let file_name = field.file_name().unwrap_or_default().to_owned();
            let image_id = generate_token(TOKEN_LENGTH);

            let (hash, size) = self.stream_part(&image_id, field).await?;
            tracing::info!(name = %file_name, id = %image_id, size, "processed upload part");

            let id = match self.data.hash_to_id(&hash).await? {
                Some(existing_id) => {
                    tracing::info!(id = %image_id, existing = %existing_id, "discarding duplicate image");
                    self.objects.discard(&image_id).await?;
                    existing_id
                }
                None => {
                    let meta = ImageMeta::new(
                        image_id.clone(),
                        hash.clone(),
                        content_type,
                        size,
                        Utc::now(),
                    );
                    self.data.add_meta(meta.clone()).await?;
                    self.objects.queue_analysis(meta).await?;
                    image_id
                }
            };

            response.processed.push(ProcessedImage {
                name: file_name,
                id,
                hash,
                size,
            });
        }

        Ok(response)
    }

    /// Hash and forward one part's bytes as bounded owned copies, then send
    /// the terminator. Returns the hex content hash and the byte count.
    async fn stream_part(
        &self,
        image_id: &str,
        mut field: Field<'_>,
    ) -> Result<(String, u64), AppError> {
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        loop {
            match field.chunk().await {
                Ok(Some(bytes)) => {
                    for piece in bytes.chunks(UPLOAD_BUFFER_SIZE) {
                        let copy = Bytes::copy_from_slice(piece);
                        hasher.update(&copy);
                        size += copy.len() as u64;
                        self.objects.store_chunk(image_id, copy).await?;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    // A dropped request body lands here; close out what we
                    // have and let the outer loop finish up.
                    tracing::warn!(id = %image_id, error = %err, "upload part read failed");
                    break;
                }
            }
        }

        self.objects.store_chunk(image_id, Bytes::new()).await?;
        Ok((format!("{:x}", hasher.finalize()), size))
    }

    /// Resolve the image and open its chunk stream. The first chunk is
    /// awaited here so that a stream that is broken from the start surfaces
    /// as an error instead of an empty 200.
    pub async fn open_download(
        &self,
        image_id: &str,
    ) -> Result<(ImageMeta, Chunk, mpsc::Receiver<Chunk>), AppError> {
        let meta = self
            .data
            .fetch_meta(image_id)
            .await?
            .ok_or(AppError::InvalidImage)?;

        let mut chunks = self.objects.fetch_chunks(image_id).await?;
        let first = chunks.recv().await.ok_or(AppError::StreamFailure)?;
        if let Some(err) = &first.err {
            tracing::error!(id = %image_id, error = %err, "failed to stream image");
            return Err(AppError::StreamFailure);
        }

        Ok((meta, first, chunks))
    }

    /// Aggregate statistics, straight from the structured store.
    pub async fn fetch_stats(&self) -> Result<obscura_core::models::ServiceStats, AppError> {
        self.data.fetch_stats().await
    }
}
