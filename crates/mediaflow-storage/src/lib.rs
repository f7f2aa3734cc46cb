//! Mediaflow Storage Library
//!
//! The [`Storage`] trait and its backends. Objects are addressed by
//! `(bucket, key)`; the bucket set is fixed (see `mediaflow_core::config`).
//!
//! # Key layout
//!
//! - originals: `YYYY/MM/DD/{asset_id}{ext}` in `media-originals`
//! - HLS output: `{asset_id}/hls/...` in `media-vod`
//! - posters: `{asset_id}/poster.jpg` in `media-thumbs`
//!
//! Keys must not contain `..` or a leading `/`.

pub mod keys;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
