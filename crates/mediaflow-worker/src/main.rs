use anyhow::{Context, Result};
use mediaflow_core::config::WorkerConfig;
use mediaflow_db::AssetRepository;
use mediaflow_infra::{init_telemetry, LogFormat};
use mediaflow_processing::{FfmpegTools, Processor, ProcessorConfig};
use mediaflow_storage::S3Storage;
use mediaflow_worker::{RedisJobQueue, WorkerPool, WorkerPoolConfig};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::from_env()?;
    config.validate().context("Configuration validation failed")?;

    init_telemetry("mediaflow-worker", LogFormat::from_env())?;

    // Schema is owned by the API, which runs migrations on startup.
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(max_connections = config.db_max_connections, "Database connected");

    let queue = RedisJobQueue::connect(config.queue.clone())
        .await
        .context("Failed to connect to Redis")?;
    queue.ping().await.context("Failed to reach Redis")?;
    tracing::info!(queue_key = %config.queue.queue_key, "Connected to job queue");

    let storage = S3Storage::new(&config.storage).context("Failed to configure object storage")?;

    let processor = Processor::new(
        Arc::new(AssetRepository::new(pool)),
        Arc::new(storage),
        Arc::new(FfmpegTools::new(
            config.ffmpeg_path.clone(),
            config.ffprobe_path.clone(),
        )),
        ProcessorConfig {
            temp_dir: PathBuf::from(&config.temp_dir),
        },
    );

    let workers = WorkerPool::start(
        Arc::new(queue),
        Arc::new(processor),
        WorkerPoolConfig::from(&config),
    );

    shutdown_signal().await;
    workers.shutdown().await;

    tracing::info!("Worker exited");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        _ = terminate => tracing::info!("Received terminate signal"),
    }
}
