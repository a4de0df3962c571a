//! Work items handed to the job execution backend.
//!
//! A job names a handler and carries its arguments. Two handlers exist on the
//! worker side:
//!
//! - `event_handler(event_type, subscription, payload)`: process one event
//! - `installation_handler(installation_id, repositories)`: bootstrap
//!   repositories of an installation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{InstallationId, Repository, Subscription};
use crate::webhooks::EventType;

/// Which repositories an installation handler should look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryScope {
    /// Exactly these repositories (trimmed objects from the webhook).
    Listed(Vec<Repository>),
    /// Every private repository of the installation.
    Private,
    /// Every repository of the installation.
    All,
}

/// A unit of work for a named handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "args", rename_all = "snake_case")]
pub enum WorkItem {
    EventHandler {
        event_type: EventType,
        subscription: Subscription,
        payload: Value,
    },
    InstallationHandler {
        installation_id: InstallationId,
        repositories: RepositoryScope,
    },
}

impl WorkItem {
    /// Handler name as the backend knows it.
    pub fn task_name(&self) -> &'static str {
        match self {
            WorkItem::EventHandler { .. } => "event_handler",
            WorkItem::InstallationHandler { .. } => "installation_handler",
        }
    }

    /// The key that picks the shard.
    ///
    /// The repository full name when there is one, so every event of a
    /// repository lands on the same queue; otherwise the installation id.
    pub fn routing_slug(&self) -> Option<String> {
        match self {
            WorkItem::EventHandler { payload, .. } => payload
                .pointer("/repository/full_name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    payload
                        .pointer("/installation/id")
                        .and_then(Value::as_u64)
                        .map(|id| id.to_string())
                }),
            WorkItem::InstallationHandler {
                installation_id,
                repositories,
            } => match repositories {
                RepositoryScope::Listed(repos) if repos.len() == 1 => {
                    Some(repos[0].full_name.clone())
                }
                _ => Some(installation_id.to_string()),
            },
        }
    }
}

/// What actually goes onto a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Destination queue name.
    pub origin: String,

    pub enqueued_at: DateTime<Utc>,

    #[serde(flatten)]
    pub item: WorkItem,
}

impl Job {
    pub fn new(origin: impl Into<String>, item: WorkItem) -> Self {
        Job {
            origin: origin.into(),
            enqueued_at: Utc::now(),
            item,
        }
    }
}
