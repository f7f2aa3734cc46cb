use crate::error::HttpAppError;
use crate::handlers::parse_asset_id;
use crate::state::AppState;
use crate::urls::build_asset_urls;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use mediaflow_core::models::{AssetKind, AssetRecord, AssetState};
use mediaflow_core::AppError;
use mediaflow_db::LIST_LIMIT;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResponse {
    pub id: Uuid,
    pub kind: AssetKind,
    pub state: AssetState,
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub bucket: String,
    pub object_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    /// Seconds, serialized as a JSON number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub urls: BTreeMap<&'static str, String>,
}

impl AssetResponse {
    pub fn from_record(state: &AppState, record: AssetRecord) -> Self {
        let urls = build_asset_urls(&state.config, &state.signer, &record.asset);
        let asset = record.asset;
        Self {
            id: asset.id,
            kind: asset.kind,
            state: asset.state,
            filename: asset.filename,
            mime_type: asset.mime_type,
            size: asset.size_bytes,
            bucket: asset.bucket,
            object_key: asset.object_key,
            width: record.width,
            height: record.height,
            duration: record.duration_seconds,
            created_at: asset.created_at,
            urls,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssetListResponse {
    pub assets: Vec<AssetResponse>,
    pub total: usize,
}

pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> Result<Json<AssetResponse>, HttpAppError> {
    let asset_id = parse_asset_id(&asset_id)?;

    let record = state
        .assets
        .get_asset(asset_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset not found".to_string()))?;

    Ok(Json(AssetResponse::from_record(&state, record)))
}

/// Newest assets first, capped at [`LIST_LIMIT`]. `total` counts the returned page.
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AssetListResponse>, HttpAppError> {
    let records = state.assets.list_assets(LIST_LIMIT).await?;

    let assets: Vec<AssetResponse> = records
        .into_iter()
        .map(|record| AssetResponse::from_record(&state, record))
        .collect();

    Ok(Json(AssetListResponse {
        total: assets.len(),
        assets,
    }))
}

/// Removes the original (best effort) and then the row; dependent rows cascade.
///
/// Derived renditions in the VOD and thumbnail buckets are left in place.
pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> Result<StatusCode, HttpAppError> {
    let asset_id = parse_asset_id(&asset_id)?;

    let record = state
        .assets
        .get_asset(asset_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset not found".to_string()))?;
    let asset = &record.asset;

    if let Err(e) = state.storage.delete(&asset.bucket, &asset.object_key).await {
        tracing::error!(
            asset_id = %asset_id,
            bucket = %asset.bucket,
            object_key = %asset.object_key,
            error = %e,
            "Failed to delete object from storage"
        );
    }

    if !state.assets.delete_asset(asset_id).await? {
        return Err(AppError::NotFound("Asset not found".to_string()).into());
    }

    tracing::info!(asset_id = %asset_id, "Asset deleted");
    Ok(StatusCode::NO_CONTENT)
}
