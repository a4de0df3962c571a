//! Webhook event types and the typed view of their payloads.
//!
//! The router forwards payloads to workers untouched, so the raw JSON is kept
//! alongside an [`EventPayload`] that names only the fields classification
//! reads. Unknown fields and event types are tolerated.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::{InstallationRef, Repository};

/// The `X-GitHub-Event` value, plus the internal `refresh` type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Installation,
    InstallationRepositories,
    PullRequest,
    PullRequestReview,
    Status,
    /// Synthesized by the refresh endpoints, never sent by GitHub.
    Refresh,
    /// Anything else GitHub may deliver.
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Installation => "installation",
            EventType::InstallationRepositories => "installation_repositories",
            EventType::PullRequest => "pull_request",
            EventType::PullRequestReview => "pull_request_review",
            EventType::Status => "status",
            EventType::Refresh => "refresh",
            EventType::Other(name) => name,
        }
    }

    /// Installation lifecycle events.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventType::Installation | EventType::InstallationRepositories
        )
    }

    /// Events about a single repository's pull requests.
    pub fn is_pull_request_family(&self) -> bool {
        matches!(
            self,
            EventType::PullRequest
                | EventType::PullRequestReview
                | EventType::Status
                | EventType::Refresh
        )
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "installation" => EventType::Installation,
            "installation_repositories" => EventType::InstallationRepositories,
            "pull_request" => EventType::PullRequest,
            "pull_request_review" => EventType::PullRequestReview,
            "status" => EventType::Status,
            "refresh" => EventType::Refresh,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        EventType::from(s.as_str())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for payload parsing failures.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// JSON deserialization failed (includes a missing `installation`).
    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// The fields of a webhook payload that classification looks at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub action: Option<String>,

    pub installation: InstallationRef,

    #[serde(default)]
    pub repository: Option<Repository>,

    /// `installation` / `created`.
    #[serde(default)]
    pub repositories: Vec<Repository>,

    /// `installation_repositories` / `added`.
    #[serde(default)]
    pub repositories_added: Vec<Repository>,

    /// `installation_repositories` / `removed`.
    #[serde(default)]
    pub repositories_removed: Vec<Repository>,

    /// Commit status state (`status` events).
    #[serde(default)]
    pub state: Option<String>,
}

impl EventPayload {
    pub fn parse(raw: &serde_json::Value) -> Result<Self, PayloadError> {
        Ok(EventPayload::deserialize(raw)?)
    }

    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or("")
    }

    /// Repository full name, or the account login when the event has no
    /// repository context.
    pub fn subject(&self) -> &str {
        self.repository
            .as_ref()
            .map(|r| r.full_name.as_str())
            .or_else(|| self.installation.account.as_ref().map(|a| a.login.as_str()))
            .unwrap_or("-")
    }
}
