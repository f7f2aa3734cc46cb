use async_trait::async_trait;
use mediaflow_core::models::{
    Asset, AssetKind, AssetMeta, AssetRecord, AssetState, NewAsset, NewAssetVariant,
};
#[cfg(feature = "test-helpers")]
use mediaflow_core::models::{AssetVariant, ProcessingJob};
use mediaflow_core::AppError;
use sqlx::PgPool;
use uuid::Uuid;

const ASSET_COLUMNS: &str = r#"
    a.id, a.kind, a.state, a.bucket, a.object_key, a.filename, a.mime_type,
    a.size_bytes, a.sha256, a.created_at, a.updated_at,
    m.width, m.height, m.duration_seconds
"#;

/// Persistence operations on assets used by the upload flow and the processor.
///
/// State transitions are guarded in SQL, so callers never read-modify-write.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn create_asset(&self, asset: &NewAsset) -> Result<Asset, AppError>;

    /// Asset joined with its metadata, if any.
    async fn get_asset(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError>;

    /// Newest first, at most `limit` rows.
    async fn list_assets(&self, limit: i64) -> Result<Vec<AssetRecord>, AppError>;

    /// Moves an asset from `uploading` to `processing`.
    ///
    /// Returns the asset kind when the guard matched, `None` when no row is
    /// currently `uploading` under that id.
    async fn begin_processing(&self, id: Uuid) -> Result<Option<AssetKind>, AppError>;

    async fn set_state(&self, id: Uuid, state: AssetState) -> Result<(), AppError>;

    /// Returns false when no row was deleted.
    async fn delete_asset(&self, id: Uuid) -> Result<bool, AppError>;

    async fn upsert_meta(&self, meta: &AssetMeta) -> Result<(), AppError>;

    async fn insert_variant(&self, variant: &NewAssetVariant) -> Result<(), AppError>;
}

/// Postgres-backed asset repository
#[derive(Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Direct reads of rows the API never serves, for integration tests.
#[cfg(feature = "test-helpers")]
impl AssetRepository {
    pub async fn list_variants(&self, asset_id: Uuid) -> Result<Vec<AssetVariant>, AppError> {
        let variants = sqlx::query_as::<_, AssetVariant>(
            r#"
            SELECT id, asset_id, variant_type, storage_path, mime_type,
                   width, height, bitrate, size_bytes, created_at
            FROM asset_variants
            WHERE asset_id = $1
            ORDER BY created_at, storage_path
            "#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    /// Bookkeeping rows for an asset, oldest first.
    pub async fn list_jobs(&self, asset_id: Uuid) -> Result<Vec<ProcessingJob>, AppError> {
        let jobs = sqlx::query_as::<_, ProcessingJob>(
            r#"
            SELECT id, asset_id, job_type, state, attempts, max_attempts,
                   priority, error_message, created_at, updated_at
            FROM processing_jobs
            WHERE asset_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }
}

#[async_trait]
impl AssetStore for AssetRepository {
    #[tracing::instrument(skip(self, asset), fields(asset_id = %asset.id, kind = %asset.kind))]
    async fn create_asset(&self, asset: &NewAsset) -> Result<Asset, AppError> {
        let created = sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO assets (id, kind, state, bucket, object_key, filename, mime_type, size_bytes)
            VALUES ($1, $2, 'uploading', $3, $4, $5, $6, $7)
            RETURNING id, kind, state, bucket, object_key, filename, mime_type,
                      size_bytes, sha256, created_at, updated_at
            "#,
        )
        .bind(asset.id)
        .bind(asset.kind)
        .bind(&asset.bucket)
        .bind(&asset.object_key)
        .bind(&asset.filename)
        .bind(&asset.mime_type)
        .bind(asset.size_bytes)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_asset(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM assets a LEFT JOIN asset_meta m ON a.id = m.asset_id WHERE a.id = $1",
            ASSET_COLUMNS
        );
        let record = sqlx::query_as::<_, AssetRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn list_assets(&self, limit: i64) -> Result<Vec<AssetRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM assets a LEFT JOIN asset_meta m ON a.id = m.asset_id \
             ORDER BY a.created_at DESC LIMIT $1",
            ASSET_COLUMNS
        );
        let records = sqlx::query_as::<_, AssetRecord>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(asset_id = %id))]
    async fn begin_processing(&self, id: Uuid) -> Result<Option<AssetKind>, AppError> {
        let kind = sqlx::query_scalar::<_, AssetKind>(
            r#"
            UPDATE assets
            SET state = 'processing'
            WHERE id = $1 AND state = 'uploading'
            RETURNING kind
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(kind)
    }

    #[tracing::instrument(skip(self), fields(asset_id = %id, state = %state))]
    async fn set_state(&self, id: Uuid, state: AssetState) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE assets SET state = $2 WHERE id = $1")
            .bind(id)
            .bind(state)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Asset {} not found", id)));
        }

        tracing::debug!(asset_id = %id, state = %state, "Asset state updated");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(asset_id = %id))]
    async fn delete_asset(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_meta(&self, meta: &AssetMeta) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO asset_meta (asset_id, width, height, duration_seconds, bitrate, codec, exif)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (asset_id) DO UPDATE SET
                width = EXCLUDED.width,
                height = EXCLUDED.height,
                duration_seconds = EXCLUDED.duration_seconds,
                bitrate = EXCLUDED.bitrate,
                codec = EXCLUDED.codec,
                exif = EXCLUDED.exif,
                updated_at = NOW()
            "#,
        )
        .bind(meta.asset_id)
        .bind(meta.width)
        .bind(meta.height)
        .bind(meta.duration_seconds)
        .bind(meta.bitrate)
        .bind(&meta.codec)
        .bind(&meta.exif)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_variant(&self, variant: &NewAssetVariant) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO asset_variants (
                asset_id, variant_type, storage_path, mime_type, width, height, bitrate, size_bytes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(variant.asset_id)
        .bind(&variant.variant_type)
        .bind(&variant.storage_path)
        .bind(&variant.mime_type)
        .bind(variant.width)
        .bind(variant.height)
        .bind(variant.bitrate)
        .bind(variant.size_bytes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
