//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use mediaflow_core::ApiConfig;
use mediaflow_infra::{init_telemetry, LogFormat};
use std::sync::Arc;

/// Validates config, connects every backing service and builds the router.
pub async fn initialize_app(config: ApiConfig) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    init_telemetry("mediaflow-api", LogFormat::from_env())?;
    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;

    let state = services::initialize_services(&config, pool).await?;

    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
