//! HTTP request handlers

pub mod assets;
pub mod health;
pub mod image;
pub mod upload;
pub mod video;

use crate::error::HttpAppError;
use mediaflow_core::AppError;
use uuid::Uuid;

/// Parses an asset id from a path or body, answering 400 on garbage.
pub(crate) fn parse_asset_id(raw: &str) -> Result<Uuid, HttpAppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| HttpAppError(AppError::InvalidInput("Invalid asset ID".to_string())))
}
