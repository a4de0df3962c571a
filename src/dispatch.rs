//! Dispatch of work items onto sharded job queues.
//!
//! ```text
//! ┌────────────┐     ┌──────────┐     ┌───────────────┐     ┌────────────────┐
//! │ classifier │ ──► │ dispatch │ ──► │ shard resolver│ ──► │ queue backend  │
//! │ / refresh  │     │          │     │ (slug → queue)│     │ (RPUSH job)    │
//! └────────────┘     └──────────┘     └───────────────┘     └────────────────┘
//! ```
//!
//! Events of one repository always land on the same queue, so the backend
//! sees them in submission order. Nothing is retried here: a failed enqueue
//! propagates to the caller and items already submitted in the same batch
//! stay submitted.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::queue::{Job, JobQueue, QueueError, WorkItem};
use crate::shard::{QueueKey, ShardResolver};
use crate::types::Subscription;
use crate::webhooks::EventType;

/// Errors that can occur while dispatching.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Neither a repository nor an installation to route by.
    #[error("work item has no routing slug (no repository or installation)")]
    Unroutable,

    #[error("failed to enqueue on {queue}: {source}")]
    Queue {
        queue: String,
        #[source]
        source: QueueError,
    },
}

/// Routes work items to queues and submits them.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<ShardResolver>,
    queue: Arc<dyn JobQueue>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("nodes", &self.resolver.ring().addresses())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(resolver: Arc<ShardResolver>, queue: Arc<dyn JobQueue>) -> Self {
        Dispatcher { resolver, queue }
    }

    /// Submits an `event_handler` item for the event.
    pub async fn dispatch_event(
        &self,
        event_type: EventType,
        subscription: &Subscription,
        payload: Value,
    ) -> Result<QueueKey, DispatchError> {
        let item = WorkItem::EventHandler {
            event_type,
            subscription: subscription.clone(),
            payload,
        };
        self.dispatch(subscription, item).await
    }

    /// Resolves the queue for `item` and enqueues it.
    ///
    /// Returns the queue the item went to.
    #[instrument(skip(self, subscription, item), fields(task = item.task_name()))]
    pub async fn dispatch(
        &self,
        subscription: &Subscription,
        item: WorkItem,
    ) -> Result<QueueKey, DispatchError> {
        let slug = item.routing_slug().ok_or(DispatchError::Unroutable)?;
        let key = self.resolver.resolve(&slug, subscription);
        let queue = key.queue_name();

        let job = Job::new(queue.clone(), item);
        self.queue
            .enqueue(&queue, &job)
            .await
            .map_err(|source| DispatchError::Queue {
                queue: queue.clone(),
                source,
            })?;

        debug!(slug = %slug, queue = %queue, vnode = key.vnode, "Dispatched work item");
        Ok(key)
    }
}
