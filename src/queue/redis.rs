//! Redis list-backed [`JobQueue`].
//!
//! Queue `name` is the list `shardhook:queue:{name}`. Jobs are JSON documents
//! appended with `RPUSH`; workers pop from the head.

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::fmt;
use tracing::{debug, info};

use super::{Job, JobQueue, QueueError};

const KEY_PREFIX: &str = "shardhook:queue:";

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisJobQueue")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisJobQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        info!(url = %redis_url, "Connecting to queue backend");

        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self { conn })
    }

    /// The list key backing a queue.
    pub fn list_key(queue: &str) -> String {
        format!("{KEY_PREFIX}{queue}")
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, queue: &str, job: &Job) -> Result<(), QueueError> {
        let encoded = serde_json::to_string(job)?;
        let key = Self::list_key(queue);

        let mut conn = self.conn.clone();
        let depth: u64 = conn.rpush::<_, _, u64>(&key, encoded).await?;

        debug!(queue, task = job.item.task_name(), depth, "Job enqueued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_key_is_prefixed() {
        assert_eq!(
            RedisJobQueue::list_key("worker1.example.net-high"),
            "shardhook:queue:worker1.example.net-high"
        );
    }
}
