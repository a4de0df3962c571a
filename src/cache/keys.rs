//! Cache key layout shared with the rest of the platform.

use std::fmt;

use crate::types::{InstallationId, Repository};

/// Component rendered for "match anything".
pub const WILDCARD: &str = "*";

/// Hash holding rendered status messages, keyed by message id.
pub const STATUS_HASH: &str = "status";

/// List recording captured events for the test-support endpoint.
pub const EVENTS_TESTING_LIST: &str = "events-testing";

/// Key holding the cached subscription of an installation.
pub fn subscription_key(installation_id: InstallationId) -> String {
    format!("subscription-cache-{installation_id}")
}

/// Key (or pattern) for cached queue state:
/// `queues~{installation}~{owner}~{repo}~{private}~{branch}`.
///
/// Owner and repository are lower-cased. Unset components render as `*`,
/// which turns the key into a pattern covering every matching entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueuesKey {
    pub installation_id: InstallationId,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub private: Option<bool>,
    pub branch: Option<String>,
}

impl QueuesKey {
    /// Every entry of an installation.
    pub fn installation(installation_id: InstallationId) -> Self {
        QueuesKey {
            installation_id,
            owner: None,
            repo: None,
            private: None,
            branch: None,
        }
    }

    /// Every branch of one repository.
    pub fn repository(
        installation_id: InstallationId,
        owner: impl AsRef<str>,
        repo: impl AsRef<str>,
    ) -> Self {
        QueuesKey {
            owner: Some(owner.as_ref().to_lowercase()),
            repo: Some(repo.as_ref().to_lowercase()),
            ..QueuesKey::installation(installation_id)
        }
    }

    /// One branch of a repository with known visibility; `None` covers every
    /// branch.
    pub fn branch(
        installation_id: InstallationId,
        repository: &Repository,
        branch: Option<&str>,
    ) -> Self {
        QueuesKey {
            private: Some(repository.private),
            branch: branch.map(str::to_string),
            ..QueuesKey::repository(installation_id, repository.owner(), &repository.name)
        }
    }

    /// True if any component is a wildcard.
    pub fn is_pattern(&self) -> bool {
        self.owner.is_none()
            || self.repo.is_none()
            || self.private.is_none()
            || self.branch.as_deref().is_none_or(|b| b == WILDCARD)
    }
}

impl fmt::Display for QueuesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let private = match self.private {
            Some(true) => "True",
            Some(false) => "False",
            None => WILDCARD,
        };
        write!(
            f,
            "queues~{}~{}~{}~{}~{}",
            self.installation_id,
            self.owner.as_deref().unwrap_or(WILDCARD),
            self.repo.as_deref().unwrap_or(WILDCARD),
            private,
            self.branch.as_deref().unwrap_or(WILDCARD),
        )
    }
}
