//! Event classification.
//!
//! Classification is a pure function of the event type, the payload and the
//! installation's subscription. It is written as an ordered rule table: the
//! first rule whose predicate matches decides the outcome.
//!
//! | # | Rule                         | Outcome                                  |
//! |---|------------------------------|------------------------------------------|
//! | 1 | no token (except cleanup)    | ignored (no token)                       |
//! | 2 | installation/created         | installation handler per covered repo    |
//! | 3 | installation/deleted         | evict the whole installation             |
//! | 4 | installation_repositories/added   | installation handler per covered repo |
//! | 5 | installation_repositories/removed | evict each covered repo             |
//! | 6 | other lifecycle action       | ignored (action ...)                     |
//! | 7 | pull request family          | event handler, unless filtered           |
//! | 8 | anything else                | ignored (unexpected event_type)          |
//!
//! Lifecycle cleanup (rules 3 and 5) runs even when the installation has no
//! token. Dispatching rules never do.

use serde_json::Value;
use std::fmt;

use super::events::{EventPayload, EventType};
use crate::cache::QueuesKey;
use crate::queue::{RepositoryScope, WorkItem};
use crate::types::{InstallationId, Repository, Subscription};

/// `pull_request` actions that warrant processing.
pub const HANDLED_PULL_REQUEST_ACTIONS: &[&str] = &[
    "opened",
    "reopened",
    "closed",
    "synchronize",
    "labeled",
    "unlabeled",
];

/// Why an event was not processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NoToken,
    /// The action is not one the event type handles.
    UnhandledAction(String),
    /// Private repository without a subscription.
    NotCovered,
    /// Pending commit status.
    StatePending,
    /// Pull request event without a repository.
    NoRepository,
    UnexpectedType,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NoToken => f.write_str("no token"),
            IgnoreReason::UnhandledAction(action) => write!(f, "action {action}"),
            IgnoreReason::NotCovered => f.write_str("not public or subscribe"),
            IgnoreReason::StatePending => f.write_str("state pending"),
            IgnoreReason::NoRepository => f.write_str("no repository"),
            IgnoreReason::UnexpectedType => f.write_str("unexpected event_type"),
        }
    }
}

/// What to do with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Ignored(IgnoreReason),
    /// Submit these items, in order.
    Dispatch(Vec<WorkItem>),
    /// Evict these cache scopes.
    Invalidate(Vec<QueuesKey>),
}

impl Decision {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Decision::Ignored(_))
    }
}

/// Rendered as the `action` field of the audit log line.
impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Ignored(reason) => write!(f, "ignored ({reason})"),
            Decision::Dispatch(_) => f.write_str("pushed to backend"),
            Decision::Invalidate(_) => f.write_str("handled, cache cleaned"),
        }
    }
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    pub event_type: &'a EventType,
    pub payload: &'a EventPayload,
    /// The payload as received; forwarded to workers untouched.
    pub raw: &'a Value,
    pub subscription: &'a Subscription,
}

impl ClassifyInput<'_> {
    fn is(&self, event_type: EventType, action: &str) -> bool {
        *self.event_type == event_type && self.payload.action() == action
    }

    fn installation_id(&self) -> InstallationId {
        self.payload.installation.id
    }

    fn is_lifecycle_cleanup(&self) -> bool {
        self.is(EventType::Installation, "deleted")
            || self.is(EventType::InstallationRepositories, "removed")
    }

    /// Repositories the subscription may process.
    fn covered<'r>(&self, repos: &'r [Repository]) -> impl Iterator<Item = &'r Repository> {
        let subscription = self.subscription;
        repos.iter().filter(move |r| subscription.covers(r.private))
    }
}

struct Rule {
    name: &'static str,
    matches: fn(&ClassifyInput<'_>) -> bool,
    decide: fn(&ClassifyInput<'_>) -> Decision,
}

const RULES: &[Rule] = &[
    Rule {
        name: "no-token",
        matches: no_token,
        decide: |_| Decision::Ignored(IgnoreReason::NoToken),
    },
    Rule {
        name: "installation-created",
        matches: |i| i.is(EventType::Installation, "created"),
        decide: |i| bootstrap(i, &i.payload.repositories),
    },
    Rule {
        name: "installation-deleted",
        matches: |i| i.is(EventType::Installation, "deleted"),
        decide: |i| Decision::Invalidate(vec![QueuesKey::installation(i.installation_id())]),
    },
    Rule {
        name: "repositories-added",
        matches: |i| i.is(EventType::InstallationRepositories, "added"),
        decide: |i| bootstrap(i, &i.payload.repositories_added),
    },
    Rule {
        name: "repositories-removed",
        matches: |i| i.is(EventType::InstallationRepositories, "removed"),
        decide: repositories_removed,
    },
    Rule {
        name: "lifecycle-other",
        matches: |i| i.event_type.is_lifecycle(),
        decide: |i| Decision::Ignored(IgnoreReason::UnhandledAction(i.payload.action().to_string())),
    },
    Rule {
        name: "pull-request-family",
        matches: |i| i.event_type.is_pull_request_family(),
        decide: pull_request_family,
    },
    Rule {
        name: "unexpected",
        matches: |_| true,
        decide: |_| Decision::Ignored(IgnoreReason::UnexpectedType),
    },
];

fn no_token(input: &ClassifyInput<'_>) -> bool {
    !input.subscription.has_token() && !input.is_lifecycle_cleanup()
}

/// One installation handler per covered repository.
fn bootstrap(input: &ClassifyInput<'_>, repos: &[Repository]) -> Decision {
    let installation_id = input.installation_id();
    let items = input
        .covered(repos)
        .map(|repo| WorkItem::InstallationHandler {
            installation_id,
            repositories: RepositoryScope::Listed(vec![repo.clone()]),
        })
        .collect();
    Decision::Dispatch(items)
}

fn repositories_removed(input: &ClassifyInput<'_>) -> Decision {
    let installation_id = input.installation_id();
    let owner = input
        .payload
        .installation
        .account
        .as_ref()
        .map(|a| a.login.clone());

    let keys = input
        .covered(&input.payload.repositories_removed)
        .map(|repo| {
            let owner = owner.clone().unwrap_or_else(|| repo.owner().to_string());
            QueuesKey::repository(installation_id, &owner, &repo.name)
        })
        .collect();
    Decision::Invalidate(keys)
}

fn pull_request_family(input: &ClassifyInput<'_>) -> Decision {
    let Some(repository) = &input.payload.repository else {
        return Decision::Ignored(IgnoreReason::NoRepository);
    };

    if !input.subscription.covers(repository.private) {
        return Decision::Ignored(IgnoreReason::NotCovered);
    }

    if *input.event_type == EventType::Status && input.payload.state.as_deref() == Some("pending") {
        return Decision::Ignored(IgnoreReason::StatePending);
    }

    if *input.event_type == EventType::PullRequest
        && !HANDLED_PULL_REQUEST_ACTIONS.contains(&input.payload.action())
    {
        return Decision::Ignored(IgnoreReason::UnhandledAction(
            input.payload.action().to_string(),
        ));
    }

    Decision::Dispatch(vec![WorkItem::EventHandler {
        event_type: input.event_type.clone(),
        subscription: input.subscription.clone(),
        payload: input.raw.clone(),
    }])
}

/// Classifies an event. Pure; performs no I/O.
pub fn classify(input: &ClassifyInput<'_>) -> Decision {
    for rule in RULES {
        if (rule.matches)(input) {
            tracing::trace!(rule = rule.name, "Classification rule matched");
            return (rule.decide)(input);
        }
    }
    // The last rule matches everything.
    Decision::Ignored(IgnoreReason::UnexpectedType)
}
