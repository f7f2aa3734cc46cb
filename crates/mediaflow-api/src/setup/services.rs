//! Construction of the shared services held in [`AppState`].

use crate::imgproxy::ImgproxySigner;
use crate::state::AppState;
use anyhow::{Context, Result};
use mediaflow_core::ApiConfig;
use mediaflow_db::AssetRepository;
use mediaflow_storage::S3Storage;
use mediaflow_worker::RedisJobQueue;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub async fn initialize_services(config: &ApiConfig, pool: PgPool) -> Result<Arc<AppState>> {
    let storage = S3Storage::new(&config.storage).context("Failed to configure object storage")?;

    let queue = RedisJobQueue::connect(config.queue.clone())
        .await
        .context("Failed to connect to Redis")?;
    queue.ping().await.context("Failed to reach Redis")?;
    tracing::info!(queue_key = %config.queue.queue_key, "Connected to Redis");

    let signer = ImgproxySigner::new(&config.imgproxy_key, &config.imgproxy_salt)
        .context("Invalid imgproxy credentials")?;

    let http = build_http_client(config)?;

    Ok(Arc::new(AppState {
        assets: Arc::new(AssetRepository::new(pool)),
        storage: Arc::new(storage),
        queue: Arc::new(queue),
        signer,
        http,
        config: config.clone(),
    }))
}

/// Client for upstream fetches, bounded by the request timeout.
pub fn build_http_client(config: &ApiConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}
