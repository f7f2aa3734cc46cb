use crate::imgproxy::ImgproxySigner;
use mediaflow_core::ApiConfig;
use mediaflow_db::AssetStore;
use mediaflow_storage::Storage;
use mediaflow_worker::JobQueue;
use std::sync::Arc;

/// Services shared by every request handler, built once at startup.
pub struct AppState {
    pub assets: Arc<dyn AssetStore>,
    pub storage: Arc<dyn Storage>,
    pub queue: Arc<dyn JobQueue>,
    pub signer: ImgproxySigner,
    /// Outbound client for the image proxy.
    pub http: reqwest::Client,
    pub config: ApiConfig,
}
