//! Hand-off to the job execution backend.
//!
//! The router only enqueues. Execution, retries and ordering within a queue
//! belong to the backend.

use async_trait::async_trait;
use thiserror::Error;

pub mod job;
pub mod redis;

pub use job::{Job, RepositoryScope, WorkItem};
pub use self::redis::RedisJobQueue;

/// Errors submitting a job.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    #[error("failed to encode job: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A job queue backend.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends a job to the named queue. One atomic call; no retries.
    async fn enqueue(&self, queue: &str, job: &Job) -> Result<(), QueueError>;
}
