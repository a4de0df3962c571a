//! Repository and installation references as they appear in webhook payloads.
//!
//! GitHub sends slightly different repository shapes depending on the event
//! (installation events carry a trimmed object, pull request events a full
//! one). We only name the fields the router needs and keep everything else in
//! `extra`, so a repository serializes back to the exact JSON we received.
//! Queue workers rely on that when a synthetic event mimics a native one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::InstallationId;

/// A repository object from a webhook payload or the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/name`.
    pub full_name: String,

    /// Repository name without the owner.
    pub name: String,

    /// Visibility. Absent in a few trimmed payloads, where it means public.
    #[serde(default)]
    pub private: bool,

    /// Every other field, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Repository {
    /// Builds a minimal repository object.
    pub fn new(full_name: impl Into<String>, private: bool) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .split_once('/')
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| full_name.clone());
        Repository {
            full_name,
            name,
            private,
            extra: Map::new(),
        }
    }

    /// The owner login, taken from `owner.login` or the `full_name` prefix.
    pub fn owner(&self) -> &str {
        self.extra
            .get("owner")
            .and_then(|o| o.get("login"))
            .and_then(|l| l.as_str())
            .or_else(|| self.full_name.split_once('/').map(|(owner, _)| owner))
            .unwrap_or(&self.full_name)
    }

    /// The full JSON object.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The account an installation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
}

/// The `installation` object carried by every app webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRef {
    pub id: InstallationId,

    /// Present on installation lifecycle events only.
    #[serde(default)]
    pub account: Option<Account>,
}
