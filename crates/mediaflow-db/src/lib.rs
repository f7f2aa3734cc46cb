//! Mediaflow Database Library
//!
//! Repositories over a `sqlx::PgPool`. The schema lives in `migrations/` at the
//! workspace root and is applied by the API server on startup.

pub mod assets;

pub use assets::{AssetRepository, AssetStore};

/// Page size of the asset listing.
pub const LIST_LIMIT: i64 = 50;
