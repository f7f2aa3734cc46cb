//! Object key generation.

use crate::traits::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

/// Key of an uploaded original: `YYYY/MM/DD/{asset_id}{ext}`.
///
/// The extension is taken verbatim from `filename`, including its dot.
pub fn original_key(asset_id: Uuid, filename: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}{}",
        now.format("%Y/%m/%d"),
        asset_id,
        file_extension(filename)
    )
}

/// `.ext` of a filename, or an empty string when there is none.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

/// Prefix under which the HLS tree of an asset is stored.
pub fn hls_prefix(asset_id: Uuid) -> String {
    format!("{}/hls", asset_id)
}

pub fn hls_master_key(asset_id: Uuid) -> String {
    format!("{}/master.m3u8", hls_prefix(asset_id))
}

pub fn poster_key(asset_id: Uuid) -> String {
    format!("{}/poster.jpg", asset_id)
}

/// Rejects keys that could escape their bucket prefix.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn original_key_is_partitioned_by_day() {
        let id = Uuid::parse_str("6f1c1f2e-8a0b-4d59-9a43-3a4f6f1d2c10").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 23, 59, 0).unwrap();
        assert_eq!(
            original_key(id, "clip.mp4", now),
            "2024/03/07/6f1c1f2e-8a0b-4d59-9a43-3a4f6f1d2c10.mp4"
        );
    }

    #[test]
    fn original_key_without_extension() {
        let id = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(original_key(id, "README", now), format!("2024/12/01/{}", id));
    }

    #[test]
    fn extension_keeps_last_component_only() {
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("Photo.JPG"), ".JPG");
        assert_eq!(file_extension(""), "");
    }

    #[test]
    fn rendition_keys_follow_asset_prefix() {
        let id = Uuid::new_v4();
        assert_eq!(hls_master_key(id), format!("{}/hls/master.m3u8", id));
        assert_eq!(poster_key(id), format!("{}/poster.jpg", id));
    }

    #[test]
    fn validate_key_rejects_traversal() {
        assert!(validate_key("2024/01/01/a.mp4").is_ok());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("a/../../b").is_err());
        assert!(validate_key("").is_err());
    }
}
