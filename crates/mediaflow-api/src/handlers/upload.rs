//! Upload initiation and completion.
//!
//! Clients never stream bytes through the API: `init-upload` creates the asset
//! row and hands back a presigned PUT, `complete` moves the asset out of
//! `uploading` and, for video, queues the transcode.

use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::parse_asset_id;
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use mediaflow_core::models::{AssetKind, AssetState, Job, NewAsset};
use mediaflow_core::{AppError, BUCKET_ORIGINALS};
use mediaflow_storage::keys::original_key;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

/// Lifetime of the presigned upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Deserialize, Validate)]
pub struct InitUploadRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "mime is required"))]
    pub mime: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "kind is required"))]
    pub kind: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "filename is required"))]
    pub filename: String,
    /// Declared by the client; not checked against the uploaded bytes.
    #[serde(default)]
    #[validate(range(min = 0, message = "size must not be negative"))]
    pub size: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub asset_id: Uuid,
    pub bucket: String,
    pub object_key: String,
    pub presigned_url: String,
    /// Headers the client must send with the PUT.
    pub headers: HashMap<String, String>,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    #[serde(default)]
    pub asset_id: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteUploadResponse {
    pub state: AssetState,
    pub message: String,
}

pub async fn init_upload(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<InitUploadRequest>,
) -> Result<Json<InitUploadResponse>, HttpAppError> {
    request.validate().map_err(AppError::from)?;
    let kind: AssetKind = request
        .kind
        .parse()
        .map_err(|e: anyhow::Error| AppError::InvalidInput(e.to_string()))?;

    let asset_id = Uuid::new_v4();
    let object_key = original_key(asset_id, &request.filename, Utc::now());

    let asset = state
        .assets
        .create_asset(&NewAsset {
            id: asset_id,
            kind,
            bucket: BUCKET_ORIGINALS.to_string(),
            object_key: object_key.clone(),
            filename: request.filename.clone(),
            mime_type: request.mime.clone(),
            size_bytes: request.size,
        })
        .await?;

    // The row is kept if presigning fails; it stays `uploading` and is never completed.
    let presigned_url = state
        .storage
        .presigned_put_url(BUCKET_ORIGINALS, &object_key, UPLOAD_URL_TTL)
        .await?;

    tracing::info!(
        asset_id = %asset.id,
        object_key = %asset.object_key,
        size_bytes = asset.size_bytes,
        "Upload initiated"
    );

    Ok(Json(InitUploadResponse {
        asset_id: asset.id,
        bucket: asset.bucket,
        object_key: asset.object_key,
        presigned_url,
        headers: HashMap::from([("Content-Type".to_string(), request.mime)]),
        expires_in: UPLOAD_URL_TTL.as_secs(),
    }))
}

pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CompleteUploadRequest>,
) -> Result<Json<CompleteUploadResponse>, HttpAppError> {
    let asset_id = parse_asset_id(&request.asset_id)?;

    let kind = state
        .assets
        .begin_processing(asset_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset not found or already processed".to_string()))?;

    let final_state = match kind {
        AssetKind::Video => {
            let job = Job::transcode(asset_id);
            // The transition above is not rolled back: a lost job leaves the
            // asset in `processing` until someone re-enqueues it.
            if let Err(e) = state.queue.enqueue(&job).await {
                tracing::error!(asset_id = %asset_id, job_id = %job.id, error = %e, "Failed to enqueue transcoding job");
            }
            AssetState::Processing
        }
        // Images are transformed on read by the image proxy; audio and
        // documents have no pipeline yet.
        AssetKind::Image | AssetKind::Audio | AssetKind::Document => {
            if let Err(e) = state.assets.set_state(asset_id, AssetState::Ready).await {
                tracing::error!(asset_id = %asset_id, error = %e, "Failed to mark asset ready");
            }
            AssetState::Ready
        }
    };

    tracing::info!(asset_id = %asset_id, kind = %kind, state = %final_state, "Upload completed");

    Ok(Json(CompleteUploadResponse {
        state: final_state,
        message: "Upload completed successfully".to_string(),
    }))
}
