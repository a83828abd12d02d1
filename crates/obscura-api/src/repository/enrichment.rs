//! Deferred image analysis.
//!
//! The worker drains the analysis queue for the lifetime of the process.
//! Sanity checks already happened at upload time; here the stored bytes are
//! re-read to fill in what only the content can tell us: the actual media
//! type from the magic bytes, and the camera model and GPS position from
//! EXIF. Every failure along the way is logged and skipped so that whatever
//! could be extracted still gets persisted.

use std::io::Cursor;
use std::sync::Arc;

use exif::{In, Tag};
use obscura_core::models::ImageMeta;
use obscura_storage::ObjectSource;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use super::data::DataRepository;

pub struct EnrichmentWorker {
    source: Arc<dyn ObjectSource>,
    data: DataRepository,
}

impl EnrichmentWorker {
    pub fn new(source: Arc<dyn ObjectSource>, data: DataRepository) -> Self {
        EnrichmentWorker { source, data }
    }

    /// Consume the analysis queue until the service shuts down.
    pub async fn run(self, mut rx: mpsc::Receiver<ImageMeta>) {
        while let Some(mut meta) = rx.recv().await {
            meta.apply_defaults();
            self.enrich(&mut meta).await;
            tracing::info!(id = %meta.id, size = meta.size, "updating image metadata");
            if let Err(err) = self.data.update_meta(meta).await {
                tracing::warn!(error = %err, "could not persist enriched metadata");
            }
        }
        tracing::debug!("analysis consumer stopping");
    }

    pub(crate) async fn enrich(&self, meta: &mut ImageMeta) {
        self.update_meta_from_exif(meta).await;
        self.update_format(meta).await;
    }

    async fn read_object(&self, id: &str) -> Option<Vec<u8>> {
        let mut reader = match self.source.open_reader(id).await {
            Ok(reader) => reader,
            Err(err) => {
                tracing::warn!(id, error = %err, "cannot obtain reader for image analysis");
                return None;
            }
        };
        let mut buf = Vec::new();
        let result = reader.read_to_end(&mut buf).await;
        self.source.release_reader(id, reader).await;
        match result {
            Ok(_) => Some(buf),
            Err(err) => {
                tracing::warn!(id, error = %err, "error reading image for analysis");
                None
            }
        }
    }

    async fn update_meta_from_exif(&self, meta: &mut ImageMeta) {
        let Some(buf) = self.read_object(&meta.id).await else {
            return;
        };

        let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(&buf)) {
            Ok(exif) => exif,
            Err(err) => {
                tracing::debug!(id = %meta.id, error = %err, "cannot decode exif data from image");
                return;
            }
        };

        // Only the camera model and GPS coordinates for now; there is plenty
        // more in here if we ever want it.
        if let Some(field) = exif.get_field(Tag::Model, In::PRIMARY) {
            meta.camera_model = field
                .display_value()
                .to_string()
                .trim_matches('"')
                .to_string();
        }

        if let (Some(latitude), Some(longitude)) = (
            gps_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S"),
            gps_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W"),
        ) {
            meta.latitude = latitude;
            meta.longitude = longitude;
        }
    }

    async fn update_format(&self, meta: &mut ImageMeta) {
        let Some(buf) = self.read_object(&meta.id).await else {
            return;
        };

        match image::guess_format(&buf) {
            Ok(format) => meta.media_type = format.to_mime_type().to_string(),
            Err(err) => {
                tracing::debug!(id = %meta.id, error = %err, "cannot detect image format");
            }
        }
    }
}

/// Decode one GPS coordinate: a degrees/minutes/seconds rational triplet plus
/// a hemisphere reference that decides the sign.
fn gps_coordinate(
    exif: &exif::Exif,
    value_tag: Tag,
    ref_tag: Tag,
    negative_hemisphere: &str,
) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let exif::Value::Rational(ref parts) = field.value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }
    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;

    let sign = exif
        .get_field(ref_tag, In::PRIMARY)
        .map(|field| field.display_value().to_string())
        .map(|reference| {
            if reference.trim_matches('"').starts_with(negative_hemisphere) {
                -1.0
            } else {
                1.0
            }
        })
        .unwrap_or(1.0);

    Some(sign * degrees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use obscura_core::models::UNKNOWN_CAMERA_MODEL;
    use obscura_db::NoOpStore;
    use obscura_storage::{FileStore, ObjectStore};
    use tempfile::tempdir;

    /// Minimal valid 1x1 PNG bytes.
    fn minimal_png() -> Vec<u8> {
        vec![
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00,
            0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08,
            0xD7, 0x63, 0xF8, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x18, 0xDD, 0x8D,
            0x89, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ]
    }

    async fn worker_with_object(dir: &std::path::Path, id: &str, bytes: &[u8]) -> EnrichmentWorker {
        let mut store = FileStore::new(dir).await.unwrap();
        store
            .store_chunk(id, Bytes::copy_from_slice(bytes), false)
            .await
            .unwrap();
        store.store_chunk(id, Bytes::new(), true).await.unwrap();
        let data = DataRepository::spawn(8, 8, 8, std::sync::Arc::new(NoOpStore));
        EnrichmentWorker::new(store.source(), data)
    }

    #[tokio::test]
    async fn detects_media_type_from_magic_bytes() {
        let dir = tempdir().unwrap();
        let worker = worker_with_object(dir.path(), "img", &minimal_png()).await;

        let mut meta = ImageMeta::new(
            "img".into(),
            "hash".into(),
            // The uploader claimed JPEG; the magic bytes say otherwise.
            "image/jpeg".into(),
            minimal_png().len() as u64,
            Utc::now(),
        );
        worker.enrich(&mut meta).await;
        assert_eq!(meta.media_type, "image/png");
    }

    #[tokio::test]
    async fn exif_failures_leave_defaults_in_place() {
        let dir = tempdir().unwrap();
        // Not an image at all; both analysis passes fail quietly.
        let worker = worker_with_object(dir.path(), "img", b"not an image").await;

        let mut meta = ImageMeta::new(
            "img".into(),
            "hash".into(),
            "image/png".into(),
            12,
            Utc::now(),
        );
        worker.enrich(&mut meta).await;
        assert_eq!(meta.camera_model, UNKNOWN_CAMERA_MODEL);
        assert_eq!(meta.latitude, 0.0);
        assert_eq!(meta.longitude, 0.0);
        assert_eq!(meta.media_type, "image/png");
    }

    #[tokio::test]
    async fn missing_object_is_survivable() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        let data = DataRepository::spawn(8, 8, 8, std::sync::Arc::new(NoOpStore));
        let worker = EnrichmentWorker::new(store.source(), data);

        let mut meta = ImageMeta::new(
            "never-stored".into(),
            "hash".into(),
            "image/png".into(),
            0,
            Utc::now(),
        );
        worker.enrich(&mut meta).await;
        assert_eq!(meta.media_type, "image/png");
    }
}
