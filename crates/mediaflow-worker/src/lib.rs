//! Mediaflow Worker Library
//!
//! The job queue shared by the API (producer) and the worker (consumer), and
//! the fixed-size pool that pops jobs and dispatches them to a [`JobHandler`].

pub mod handler;
pub mod pool;
pub mod queue;

pub use handler::JobHandler;
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use queue::{JobQueue, MemoryJobQueue, QueueError, QueueResult, RedisJobQueue};
