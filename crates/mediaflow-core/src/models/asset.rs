use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Media family of an asset. Decides which processing path runs after upload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "asset_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Document,
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetKind::Image => write!(f, "image"),
            AssetKind::Video => write!(f, "video"),
            AssetKind::Audio => write!(f, "audio"),
            AssetKind::Document => write!(f, "document"),
        }
    }
}

impl FromStr for AssetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(AssetKind::Image),
            "video" => Ok(AssetKind::Video),
            "audio" => Ok(AssetKind::Audio),
            "document" => Ok(AssetKind::Document),
            _ => Err(anyhow::anyhow!(
                "Invalid kind. Must be: image, video, audio, or document"
            )),
        }
    }
}

/// Lifecycle state of an asset.
///
/// `uploading -> processing -> ready | failed`. Transitions out of `uploading`
/// are guarded in SQL so concurrent completions cannot both win.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "asset_state", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl AssetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AssetState::Ready | AssetState::Failed)
    }
}

impl Display for AssetState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetState::Uploading => write!(f, "uploading"),
            AssetState::Processing => write!(f, "processing"),
            AssetState::Ready => write!(f, "ready"),
            AssetState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Asset {
    pub id: Uuid,
    pub kind: AssetKind,
    pub state: AssetState,
    pub bucket: String,
    pub object_key: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub sha256: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when an upload is initiated.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub id: Uuid,
    pub kind: AssetKind,
    pub bucket: String,
    pub object_key: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// An asset joined with the subset of its technical metadata exposed by the API.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AssetRecord {
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub asset: Asset,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_seconds: Option<Decimal>,
}

/// Technical metadata, one row per asset. Overwritten on every extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AssetMeta {
    pub asset_id: Uuid,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_seconds: Option<Decimal>,
    pub bitrate: Option<i64>,
    pub codec: Option<String>,
    pub exif: Option<JsonValue>,
}

/// A derived rendition (HLS rung, poster) of an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AssetVariant {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub variant_type: String,
    pub storage_path: String,
    pub mime_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub bitrate: Option<i64>,
    pub size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAssetVariant {
    pub asset_id: Uuid,
    pub variant_type: String,
    pub storage_path: String,
    pub mime_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub bitrate: Option<i64>,
    pub size_bytes: Option<i64>,
}
