use mediaflow_core::AppError;
use mediaflow_storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Asset not found: {0}")]
    AssetNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] AppError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to execute {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Transcode produced no output in {0}")]
    EmptyOutput(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;
