//! Fixed-size pool of queue consumers.
//!
//! Each worker loops: pop (bounded wait), decode, dispatch under a per-job
//! timeout. [`WorkerPool::shutdown`] cancels every worker and waits for all of
//! them to exit. A job still running at that point is abandoned.

use crate::handler::JobHandler;
use crate::queue::JobQueue;
use mediaflow_core::config::WorkerConfig;
use mediaflow_core::models::Job;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Longest payload prefix echoed into logs when a message cannot be decoded.
const MAX_LOGGED_PAYLOAD: usize = 256;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub pop_timeout: Duration,
    pub job_timeout: Duration,
    /// Pause after a queue read error before the next pop.
    pub error_backoff: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            pop_timeout: Duration::from_secs(5),
            job_timeout: Duration::from_secs(30 * 60),
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl From<&WorkerConfig> for WorkerPoolConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            pop_timeout: Duration::from_secs(config.queue.pop_timeout_secs),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            error_backoff: Duration::from_secs(config.error_backoff_secs),
        }
    }
}

pub struct WorkerPool {
    token: CancellationToken,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Spawns `concurrency` workers (at least one) on the current runtime.
    pub fn start(
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        config: WorkerPoolConfig,
    ) -> Self {
        let token = CancellationToken::new();
        let mut workers = JoinSet::new();
        let concurrency = config.concurrency.max(1);

        tracing::info!(
            concurrency = concurrency,
            job_timeout_secs = config.job_timeout.as_secs(),
            "Starting worker pool"
        );

        for worker_id in 0..concurrency {
            let worker = Worker {
                id: worker_id,
                queue: queue.clone(),
                handler: handler.clone(),
                config: config.clone(),
                token: token.child_token(),
            };
            workers.spawn(worker.run());
        }

        Self { token, workers }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops all workers and returns once every loop has exited.
    pub async fn shutdown(mut self) {
        tracing::info!("Worker pool shutting down");
        self.token.cancel();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

struct Worker {
    id: usize,
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    config: WorkerPoolConfig,
    token: CancellationToken,
}

impl Worker {
    async fn run(self) {
        tracing::info!(worker_id = self.id, "Worker started");

        while !self.token.is_cancelled() {
            let payload = match self.queue.dequeue(self.config.pop_timeout).await {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(worker_id = self.id, error = %e, "Failed to pop job");
                    tokio::select! {
                        _ = self.token.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => continue,
                    }
                }
            };

            if self.token.is_cancelled() {
                // Popped after stop was requested: hand it back for the next consumer.
                if let Err(e) = self.queue.requeue_front(&payload).await {
                    tracing::error!(worker_id = self.id, error = %e, "Failed to requeue job at shutdown");
                }
                break;
            }

            match serde_json::from_str::<Job>(&payload) {
                Ok(job) => self.process(job).await,
                Err(e) => tracing::error!(
                    worker_id = self.id,
                    error = %e,
                    payload = %truncate(&payload),
                    "Discarding undecodable job"
                ),
            }
        }

        tracing::info!(worker_id = self.id, "Worker stopped");
    }

    async fn process(&self, job: Job) {
        tracing::info!(
            worker_id = self.id,
            job_id = %job.id,
            asset_id = %job.asset_id,
            job_type = %job.job_type,
            "Processing job"
        );

        let started = std::time::Instant::now();
        let outcome = tokio::select! {
            _ = self.token.cancelled() => {
                tracing::warn!(job_id = %job.id, asset_id = %job.asset_id, "Job abandoned at shutdown");
                return;
            }
            outcome = tokio::time::timeout(self.config.job_timeout, self.handler.handle(&job)) => outcome,
        };

        match outcome {
            Ok(Ok(())) => tracing::info!(
                job_id = %job.id,
                asset_id = %job.asset_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            ),
            Ok(Err(e)) => tracing::error!(
                job_id = %job.id,
                asset_id = %job.asset_id,
                job_type = %job.job_type,
                error = %format!("{e:#}"),
                "Job failed"
            ),
            Err(_) => tracing::error!(
                job_id = %job.id,
                asset_id = %job.asset_id,
                timeout_secs = self.config.job_timeout.as_secs(),
                "Job timed out"
            ),
        }
    }
}

fn truncate(payload: &str) -> &str {
    match payload.char_indices().nth(MAX_LOGGED_PAYLOAD) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}
