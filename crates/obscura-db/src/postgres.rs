//! PostgreSQL data store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use obscura_core::models::{
    CameraModelCount, DayCount, ImageMeta, PopularFormat, ServiceStats, IMAGE_MEDIA_PREFIX,
};
use obscura_core::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::DataStore;

const MAX_CONNECTIONS: u32 = 5;

const CREATE_UPLOAD_LINKS: &str = r#"
CREATE TABLE IF NOT EXISTS upload_links (
    id     TEXT PRIMARY KEY,
    expiry TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_IMAGE_META: &str = r#"
CREATE TABLE IF NOT EXISTS image_meta (
    id           TEXT PRIMARY KEY,
    hash         TEXT NOT NULL,
    media_type   TEXT NOT NULL,
    size         BIGINT NOT NULL,
    uploaded     TIMESTAMPTZ NOT NULL,
    camera_model TEXT NOT NULL DEFAULT 'unknown',
    latitude     DOUBLE PRECISION NOT NULL DEFAULT 0,
    longitude    DOUBLE PRECISION NOT NULL DEFAULT 0
)
"#;

const CREATE_HASH_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS image_meta_hash_idx ON image_meta (hash)";

pub struct PostgresStore {
    pool: PgPool,
}

fn db_err(err: sqlx::Error) -> AppError {
    AppError::Database(err.to_string())
}

fn meta_from_row(row: &PgRow) -> ImageMeta {
    ImageMeta {
        id: row.get("id"),
        hash: row.get("hash"),
        media_type: row.get("media_type"),
        size: row.get::<i64, _>("size") as u64,
        uploaded: row.get("uploaded"),
        camera_model: row.get("camera_model"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
    }
}

impl PostgresStore {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(db_err)?;
        Ok(PostgresStore { pool })
    }
}

#[async_trait]
impl DataStore for PostgresStore {
    async fn initialize(&self) -> Result<(), AppError> {
        for statement in [CREATE_UPLOAD_LINKS, CREATE_IMAGE_META, CREATE_HASH_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn put_token(&self, id: &str, expiry: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("INSERT INTO upload_links (id, expiry) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .bind(expiry)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_token_expiry(&self, id: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        let row = sqlx::query("SELECT expiry FROM upload_links WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|row| row.get("expiry")))
    }

    #[tracing::instrument(skip(self, meta), fields(id = %meta.id))]
    async fn put_meta(&self, meta: &ImageMeta) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO image_meta
                (id, hash, media_type, size, uploaded, camera_model, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&meta.id)
        .bind(&meta.hash)
        .bind(&meta.media_type)
        .bind(meta.size as i64)
        .bind(meta.uploaded)
        .bind(&meta.camera_model)
        .bind(meta.latitude)
        .bind(meta.longitude)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, meta), fields(id = %meta.id))]
    async fn update_meta(&self, meta: &ImageMeta) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE image_meta
            SET hash = $2, media_type = $3, size = $4, uploaded = $5,
                camera_model = $6, latitude = $7, longitude = $8
            WHERE id = $1
            "#,
        )
        .bind(&meta.id)
        .bind(&meta.hash)
        .bind(&meta.media_type)
        .bind(meta.size as i64)
        .bind(meta.uploaded)
        .bind(&meta.camera_model)
        .bind(meta.latitude)
        .bind(meta.longitude)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_meta(&self, id: &str) -> Result<Option<ImageMeta>, AppError> {
        let row = sqlx::query("SELECT * FROM image_meta WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(meta_from_row))
    }

    async fn get_meta_by_hash(&self, hash: &str) -> Result<Option<ImageMeta>, AppError> {
        let row = sqlx::query("SELECT * FROM image_meta WHERE hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(meta_from_row))
    }

    async fn stats(&self) -> Result<ServiceStats, AppError> {
        let mut stats = ServiceStats::default();

        let popular = sqlx::query(
            "SELECT media_type AS format, count(*) AS uploads FROM image_meta \
             GROUP BY 1 ORDER BY 2 DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(row) = popular {
            let format: String = row.get("format");
            stats.popular_format = PopularFormat {
                format: format
                    .strip_prefix(IMAGE_MEDIA_PREFIX)
                    .unwrap_or(&format)
                    .to_uppercase(),
                uploads: row.get::<i64, _>("uploads") as u64,
            };
        }

        stats.top_camera_models = sqlx::query(
            "SELECT camera_model AS model, count(*) AS uploads FROM image_meta \
             GROUP BY 1 ORDER BY 2 DESC LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|row| CameraModelCount {
            model: row.get("model"),
            uploads: row.get::<i64, _>("uploads") as u64,
        })
        .collect();

        stats.upload_frequency_30_days = sqlx::query(
            "SELECT date_trunc('day', uploaded)::date AS date, count(*) AS uploads \
             FROM image_meta WHERE uploaded > now() - interval '30 days' \
             GROUP BY 1 ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|row| DayCount {
            date: row.get::<NaiveDate, _>("date"),
            uploads: row.get::<i64, _>("uploads") as u64,
        })
        .collect();

        Ok(stats)
    }
}
