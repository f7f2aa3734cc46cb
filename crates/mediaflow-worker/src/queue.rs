//! FIFO job queue on a single Redis list.
//!
//! Producers `RPUSH` onto the tail, consumers `BLPOP` from the head with a
//! bounded wait. The list gives each job to exactly one popping consumer and
//! offers no acknowledgement: a popped job that is not processed is gone.

use async_trait::async_trait;
use mediaflow_core::config::QueueConfig;
use mediaflow_core::models::Job;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends a job to the tail of the queue.
    async fn enqueue(&self, job: &Job) -> QueueResult<()>;

    /// Pops the head payload, waiting up to `timeout`. `Ok(None)` when nothing arrived.
    ///
    /// Payloads are returned raw so the consumer can log what it fails to decode.
    async fn dequeue(&self, timeout: Duration) -> QueueResult<Option<String>>;

    /// Puts a popped payload back at the head.
    async fn requeue_front(&self, payload: &str) -> QueueResult<()>;
}

pub struct RedisJobQueue {
    client: redis::Client,
    /// Shared, auto-reconnecting connection for non-blocking commands.
    commands: ConnectionManager,
    /// Idle connections for `BLPOP`, which holds its connection while it waits.
    blocking: Mutex<Vec<MultiplexedConnection>>,
    config: QueueConfig,
}

impl RedisJobQueue {
    pub async fn connect(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let commands = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            client,
            commands,
            blocking: Mutex::new(Vec::new()),
            config,
        })
    }

    /// Round-trips a `PING` so startup fails fast on a bad `REDIS_URL`.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.commands.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    pub async fn len(&self) -> QueueResult<usize> {
        let mut conn = self.commands.clone();
        let len: usize = conn.llen(&self.config.queue_key).await?;
        Ok(len)
    }

    async fn checkout_blocking(&self) -> QueueResult<MultiplexedConnection> {
        let idle = self.idle_blocking().pop();
        match idle {
            Some(conn) => Ok(conn),
            None => Ok(self.client.get_multiplexed_async_connection().await?),
        }
    }

    fn idle_blocking(&self) -> std::sync::MutexGuard<'_, Vec<MultiplexedConnection>> {
        self.blocking
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &Job) -> QueueResult<()> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.commands.clone();
        let _: () = conn.rpush(&self.config.queue_key, payload).await?;

        tracing::info!(
            job_id = %job.id,
            asset_id = %job.asset_id,
            job_type = %job.job_type,
            "Enqueued job"
        );
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> QueueResult<Option<String>> {
        // One connection per concurrent pop; a failed one is dropped, not returned.
        let mut conn = self.checkout_blocking().await?;
        let popped: Option<(String, String)> = conn
            .blpop(&self.config.queue_key, timeout.as_secs_f64())
            .await?;
        self.idle_blocking().push(conn);
        Ok(popped.map(|(_key, payload)| payload))
    }

    async fn requeue_front(&self, payload: &str) -> QueueResult<()> {
        let mut conn = self.commands.clone();
        let _: () = conn.lpush(&self.config.queue_key, payload).await?;
        Ok(())
    }
}

/// Process-local queue with the same contract, for tests and single-binary setups.
#[derive(Default)]
pub struct MemoryJobQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a raw payload, bypassing serialization.
    pub fn push_raw(&self, payload: impl Into<String>) {
        self.lock().push_back(payload.into());
        self.notify.notify_one();
    }

    /// Decodable jobs currently waiting, head first.
    pub fn pending(&self) -> Vec<Job> {
        self.lock()
            .iter()
            .filter_map(|p| serde_json::from_str(p).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &Job) -> QueueResult<()> {
        self.push_raw(serde_json::to_string(job)?);
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> QueueResult<Option<String>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(payload) = self.lock().pop_front() {
                return Ok(Some(payload));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(self.lock().pop_front());
            }
        }
    }

    async fn requeue_front(&self, payload: &str) -> QueueResult<()> {
        self.lock().push_front(payload.to_string());
        self.notify.notify_one();
        Ok(())
    }
}
