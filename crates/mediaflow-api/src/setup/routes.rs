//! Route configuration and setup

use crate::handlers::{assets, health, image, upload, video};
use crate::state::AppState;
use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use mediaflow_core::ApiConfig;
use mediaflow_infra::request_id_middleware;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 10_000;

pub fn setup_routes(config: &ApiConfig, state: Arc<AppState>) -> Router {
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HTTP_CONCURRENCY_LIMIT)
        .max(1);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(setup_cors())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media/init-upload", post(upload::init_upload))
        .route("/media/complete", post(upload::complete_upload))
        .route("/media", get(assets::list_assets))
        .route(
            "/media/{asset_id}",
            get(assets::get_asset).delete(assets::delete_asset),
        )
        .route(
            "/video/{asset_id}/master.m3u8",
            get(video::master_playlist),
        )
        .route("/image/{signature}/{*rest}", get(image::proxy_image))
}

fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(300))
}
