//! Subscription facts for an installation.

use serde::{Deserialize, Serialize};

/// Cached entitlement for an installation.
///
/// `token` gates all processing; `subscribed` gates private repositories and
/// selects the high-priority queue lane. The router never mutates a
/// subscription, it only reads and evicts it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub subscribed: bool,
}

impl Subscription {
    pub fn new(token: impl Into<String>, subscribed: bool) -> Self {
        Subscription {
            token: Some(token.into()),
            subscribed,
        }
    }

    /// True when a non-empty token is present.
    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// True when this subscription may process a repository of the given
    /// visibility.
    pub fn covers(&self, private: bool) -> bool {
        !private || self.subscribed
    }
}
