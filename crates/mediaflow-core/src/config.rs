//! Configuration module
//!
//! Environment-driven settings for the API server and the worker. Both
//! binaries call `dotenvy::dotenv()` first so a local `.env` file is honoured.

use std::env;

/// Bucket holding uploaded originals.
pub const BUCKET_ORIGINALS: &str = "media-originals";
/// Bucket reserved for pre-rendered image derivatives.
pub const BUCKET_IMAGES: &str = "media-images";
/// Bucket holding HLS output, laid out as `{asset_id}/hls/...`.
pub const BUCKET_VOD: &str = "media-vod";
/// Bucket holding posters, laid out as `{asset_id}/poster.jpg`.
pub const BUCKET_THUMBS: &str = "media-thumbs";

const SERVER_PORT: u16 = 8080;
const DB_MAX_CONNECTIONS: u32 = 10;
const DB_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const WORKER_CONCURRENCY: usize = 2;
const JOB_TIMEOUT_SECS: u64 = 30 * 60;
const QUEUE_KEY: &str = "media:jobs:pending";
const QUEUE_POP_TIMEOUT_SECS: u64 = 5;
const QUEUE_ERROR_BACKOFF_SECS: u64 = 5;

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

fn flag(name: &str) -> bool {
    var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// S3-compatible object storage settings.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Endpoint used by the services themselves.
    pub endpoint: String,
    /// Endpoint embedded in presigned URLs handed to clients.
    pub public_endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub use_ssl: bool,
    pub use_path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let use_ssl = flag("MINIO_USE_SSL");
        let scheme = if use_ssl { "https" } else { "http" };
        let endpoint = with_scheme(&var_or("MINIO_ENDPOINT", "localhost:9000"), scheme);
        let public_endpoint = var("PUBLIC_MINIO_ENDPOINT")
            .map(|e| with_scheme(&e, scheme))
            .unwrap_or_else(|| endpoint.clone());

        Self {
            endpoint,
            public_endpoint,
            access_key: var_or("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: var_or("MINIO_SECRET_KEY", "minioadmin"),
            region: var_or("MINIO_REGION", "us-east-1"),
            use_ssl,
            use_path_style: var("MINIO_USE_PATH_STYLE").is_none() || flag("MINIO_USE_PATH_STYLE"),
        }
    }
}

/// Prefixes `scheme://` unless the endpoint already carries a scheme.
fn with_scheme(endpoint: &str, scheme: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("{}://{}", scheme, endpoint.trim_end_matches('/'))
    }
}

/// Redis list queue settings shared by the API (producer) and worker (consumer).
#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub redis_url: String,
    pub queue_key: String,
    pub pop_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/0".to_string(),
            queue_key: QUEUE_KEY.to_string(),
            pop_timeout_secs: QUEUE_POP_TIMEOUT_SECS,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            redis_url: var("REDIS_URL").unwrap_or(default.redis_url),
            ..default
        }
    }
}

/// API server configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub request_timeout_secs: u64,
    pub public_imgproxy_url: String,
    pub public_vod_url: String,
    pub public_thumbs_url: String,
    pub imgproxy_base_url: String,
    pub imgproxy_key: String,
    pub imgproxy_salt: String,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url =
            var("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;

        Ok(Self {
            server_port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(SERVER_PORT),
            database_url,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DB_MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DB_TIMEOUT_SECS),
            request_timeout_secs: var("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            public_imgproxy_url: var_or("PUBLIC_IMGPROXY_URL", "http://localhost:8081"),
            public_vod_url: var_or("PUBLIC_VOD_URL", "http://localhost:9000/media-vod"),
            public_thumbs_url: var_or("PUBLIC_THUMBS_URL", "http://localhost:9000/media-thumbs"),
            imgproxy_base_url: var_or("IMGPROXY_BASE_URL", "http://imgproxy:8080"),
            imgproxy_key: var_or("IMGPROXY_KEY", ""),
            imgproxy_salt: var_or("IMGPROXY_SALT", ""),
            storage: StorageConfig::from_env(),
            queue: QueueConfig::from_env(),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a postgres:// or postgresql:// URL"
            ));
        }

        if self.imgproxy_key.is_empty() || self.imgproxy_salt.is_empty() {
            return Err(anyhow::anyhow!(
                "IMGPROXY_KEY and IMGPROXY_SALT are required"
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECS must be positive"));
        }

        Ok(())
    }
}

/// Worker process configuration.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub concurrency: usize,
    pub temp_dir: String,
    pub job_timeout_secs: u64,
    pub error_backoff_secs: u64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database_url =
            var("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;

        Ok(Self {
            database_url,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DB_MAX_CONNECTIONS),
            concurrency: var("WORKER_CONCURRENCY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(WORKER_CONCURRENCY),
            temp_dir: var_or("TEMP_DIR", "/tmp/worker"),
            job_timeout_secs: var("JOB_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(JOB_TIMEOUT_SECS),
            error_backoff_secs: QUEUE_ERROR_BACKOFF_SECS,
            ffmpeg_path: var_or("FFMPEG_PATH", "ffmpeg"),
            ffprobe_path: var_or("FFPROBE_PATH", "ffprobe"),
            storage: StorageConfig::from_env(),
            queue: QueueConfig::from_env(),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("WORKER_CONCURRENCY must be at least 1"));
        }

        if self.job_timeout_secs == 0 {
            return Err(anyhow::anyhow!("JOB_TIMEOUT_SECS must be positive"));
        }

        Ok(())
    }
}
