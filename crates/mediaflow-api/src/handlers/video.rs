use crate::error::HttpAppError;
use crate::handlers::parse_asset_id;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mediaflow_core::models::{AssetKind, AssetState};
use mediaflow_core::{AppError, BUCKET_VOD};
use mediaflow_storage::keys::hls_master_key;
use serde_json::json;
use std::sync::Arc;

pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Serves the master playlist of a ready video from the VOD bucket.
///
/// Answers 202 while the video is still being prepared so players can poll.
pub async fn master_playlist(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> Result<Response, HttpAppError> {
    let asset_id = parse_asset_id(&asset_id)?;

    let record = state
        .assets
        .get_asset(asset_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset not found".to_string()))?;

    if record.asset.kind != AssetKind::Video {
        return Err(AppError::BadRequest("Asset is not a video".to_string()).into());
    }

    if record.asset.state != AssetState::Ready {
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "error": "Video is still processing",
                "state": record.asset.state,
            })),
        )
            .into_response());
    }

    let manifest = state
        .storage
        .get(BUCKET_VOD, &hls_master_key(asset_id))
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, HLS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "public, max-age=3600"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        manifest,
    )
        .into_response())
}
