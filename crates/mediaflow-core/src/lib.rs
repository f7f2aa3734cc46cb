//! Mediaflow Core Library
//!
//! Domain models, error types and configuration shared by the API, the worker
//! and the storage/processing crates.

pub mod config;
pub mod error;
pub mod models;

pub use config::{
    ApiConfig, QueueConfig, StorageConfig, WorkerConfig, BUCKET_IMAGES, BUCKET_ORIGINALS,
    BUCKET_THUMBS, BUCKET_VOD,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
