//! On-demand refresh of pull requests.
//!
//! A refresh rebuilds `refresh` events that look like native pull request
//! webhooks (`repository`, `installation`, `pull_request`) and hands them to
//! the [`Dispatcher`]. It recovers from missed or stale deliveries.
//!
//! Two guards run before anything is dispatched:
//!
//! 1. The repository must carry the configuration file. A missing file is an
//!    answer ([`RefreshOutcome::NoConfiguration`]), not an error.
//! 2. The installation needs a token, and a private repository needs a
//!    subscription. A failed guard is a silent no-op.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::cache::{CacheError, CacheInvalidator, QueuesKey};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::github::{HostError, SourceHost};
use crate::subscription::{SubscriptionError, SubscriptionStore};
use crate::types::{InstallationId, PrNumber, Repository, Subscription};
use crate::webhooks::EventType;

/// Which pull requests of a repository to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefSelector {
    /// Every open pull request.
    Full,
    /// Open pull requests targeting this branch.
    Branch(String),
    /// One pull request.
    Pull(PrNumber),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid pull request number: {0:?}")]
    InvalidPullNumber(String),

    #[error("empty branch name")]
    EmptyBranch,

    #[error("unknown ref selector: {0:?}")]
    Unknown(String),
}

impl FromStr for RefSelector {
    type Err = SelectorError;

    /// Parses `full`, `branch/<name>` or `pr/<number>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "full" {
            return Ok(RefSelector::Full);
        }
        if let Some(branch) = s.strip_prefix("branch/") {
            if branch.is_empty() {
                return Err(SelectorError::EmptyBranch);
            }
            return Ok(RefSelector::Branch(branch.to_string()));
        }
        if let Some(number) = s.strip_prefix("pr/") {
            return number
                .parse::<u64>()
                .map(|n| RefSelector::Pull(PrNumber(n)))
                .map_err(|_| SelectorError::InvalidPullNumber(number.to_string()));
        }
        Err(SelectorError::Unknown(s.to_string()))
    }
}

impl fmt::Display for RefSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefSelector::Full => f.write_str("full"),
            RefSelector::Branch(branch) => write!(f, "branch/{branch}"),
            RefSelector::Pull(number) => write!(f, "pr/{}", number.0),
        }
    }
}

/// Errors that fail a refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("{owner} has not installed the app on {repo}")]
    NotInstalled { owner: String, repo: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result of a targeted refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The repository has no configuration file.
    NoConfiguration,
    /// The subscription does not allow processing this repository.
    NotCovered,
    /// This many events were dispatched.
    Dispatched(usize),
}

/// Counts from a refresh of every installation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub installations: usize,
    pub repositories: usize,
    pub dispatches: usize,
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Updated {} installations, {} repositories, {} branches",
            self.installations, self.repositories, self.dispatches
        )
    }
}

/// Rebuilds and dispatches refresh events.
#[derive(Clone)]
pub struct RefreshOrchestrator {
    host: Arc<dyn SourceHost>,
    subscriptions: Arc<dyn SubscriptionStore>,
    dispatcher: Dispatcher,
    invalidator: CacheInvalidator,
    config_file: String,
}

impl RefreshOrchestrator {
    pub fn new(
        host: Arc<dyn SourceHost>,
        subscriptions: Arc<dyn SubscriptionStore>,
        dispatcher: Dispatcher,
        invalidator: CacheInvalidator,
        config_file: impl Into<String>,
    ) -> Self {
        RefreshOrchestrator {
            host,
            subscriptions,
            dispatcher,
            invalidator,
            config_file: config_file.into(),
        }
    }

    /// Refreshes the selected pull requests of one repository.
    #[instrument(skip(self, selector), fields(selector = %selector))]
    pub async fn refresh(
        &self,
        owner: &str,
        repo: &str,
        selector: &RefSelector,
    ) -> Result<RefreshOutcome, RefreshError> {
        let installation = self
            .host
            .repository_installation(owner, repo)
            .await?
            .ok_or_else(|| RefreshError::NotInstalled {
                owner: owner.to_string(),
                repo: repo.to_string(),
            })?;

        let repository = self.host.repository(installation, owner, repo).await?;

        if !self
            .host
            .has_config_file(installation, &repository, &self.config_file)
            .await?
        {
            info!(repo = %repository.full_name, "No configuration, nothing to refresh");
            return Ok(RefreshOutcome::NoConfiguration);
        }

        let pulls = match selector {
            RefSelector::Full | RefSelector::Branch(_) => {
                let branch = match selector {
                    RefSelector::Branch(branch) => Some(branch.as_str()),
                    _ => None,
                };
                let pulls = self.host.open_pulls(installation, &repository, branch).await?;
                self.invalidator
                    .invalidate(&QueuesKey::branch(installation, &repository, branch))
                    .await?;
                pulls
            }
            RefSelector::Pull(number) => {
                vec![self.host.pull(installation, &repository, *number).await?]
            }
        };

        let subscription = self.subscriptions.get(installation).await?;
        if !subscription.has_token() || !subscription.covers(repository.private) {
            debug!(
                repo = %repository.full_name,
                has_token = subscription.has_token(),
                subscribed = subscription.subscribed,
                "Refresh not covered by subscription"
            );
            return Ok(RefreshOutcome::NotCovered);
        }

        let dispatched = self
            .dispatch_pulls(installation, &repository, &subscription, pulls)
            .await?;
        info!(repo = %repository.full_name, dispatched, "Refresh dispatched");
        Ok(RefreshOutcome::Dispatched(dispatched))
    }

    /// Refreshes every open pull request the app can see.
    ///
    /// Installations without a token are counted but skipped. Repositories
    /// are counted only when covered and configured.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> Result<RefreshSummary, RefreshError> {
        let mut summary = RefreshSummary::default();

        for installation in self.host.installations().await? {
            summary.installations += 1;

            let subscription = self.subscriptions.get(installation).await?;
            if !subscription.has_token() {
                debug!(%installation, "Skipping installation without token");
                continue;
            }

            for repository in self.host.installation_repositories(installation).await? {
                if !subscription.covers(repository.private) {
                    continue;
                }
                if !self
                    .host
                    .has_config_file(installation, &repository, &self.config_file)
                    .await?
                {
                    continue;
                }

                summary.repositories += 1;
                let pulls = self.host.open_pulls(installation, &repository, None).await?;
                summary.dispatches += self
                    .dispatch_pulls(installation, &repository, &subscription, pulls)
                    .await?;
            }
        }

        info!(
            installations = summary.installations,
            repositories = summary.repositories,
            dispatches = summary.dispatches,
            "Full refresh done"
        );
        Ok(summary)
    }

    async fn dispatch_pulls(
        &self,
        installation: InstallationId,
        repository: &Repository,
        subscription: &Subscription,
        pulls: Vec<Value>,
    ) -> Result<usize, RefreshError> {
        let count = pulls.len();
        for pull in pulls {
            self.dispatcher
                .dispatch_event(
                    EventType::Refresh,
                    subscription,
                    synthetic_payload(installation, repository, pull),
                )
                .await?;
        }
        Ok(count)
    }
}

/// A payload shaped like a native pull request webhook.
pub fn synthetic_payload(
    installation: InstallationId,
    repository: &Repository,
    pull_request: Value,
) -> Value {
    json!({
        "repository": repository.to_value(),
        "installation": { "id": installation },
        "pull_request": pull_request,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::queue::WorkItem;
    use crate::shard::{ShardResolver, Topology};
    use crate::subscription::CachedSubscriptions;
    use crate::test_utils::{FakeHost, MemoryCache, RecordingQueue, pull_json, seed_subscription};

    struct Harness {
        cache: Arc<MemoryCache>,
        queue: Arc<RecordingQueue>,
        orchestrator: RefreshOrchestrator,
    }

    fn harness(host: FakeHost) -> Harness {
        let cache = Arc::new(MemoryCache::default());
        let queue = Arc::new(RecordingQueue::new());
        let topology: Topology = [("worker1".to_string(), 2)].into_iter().collect();
        let dispatcher = Dispatcher::new(
            Arc::new(ShardResolver::from_topology(&topology).unwrap()),
            queue.clone(),
        );
        let orchestrator = RefreshOrchestrator::new(
            Arc::new(host),
            Arc::new(CachedSubscriptions::new(cache.clone())),
            dispatcher,
            CacheInvalidator::new(cache.clone()),
            ".shardhook.yml",
        );
        Harness {
            cache,
            queue,
            orchestrator,
        }
    }

    fn widgets_host(configured: bool, private: bool) -> FakeHost {
        FakeHost::new().with_repo(
            InstallationId(1),
            Repository::new("acme/widgets", private),
            configured,
            vec![
                pull_json(1, "main"),
                pull_json(2, "dev"),
                pull_json(3, "main"),
            ],
        )
    }

    #[test]
    fn parses_selectors() {
        assert_eq!("full".parse::<RefSelector>(), Ok(RefSelector::Full));
        assert_eq!(
            "branch/feature/x".parse::<RefSelector>(),
            Ok(RefSelector::Branch("feature/x".to_string()))
        );
        assert_eq!("pr/42".parse::<RefSelector>(), Ok(RefSelector::Pull(PrNumber(42))));
    }

    #[test]
    fn rejects_bad_selectors() {
        assert_eq!(
            "pr/abc".parse::<RefSelector>(),
            Err(SelectorError::InvalidPullNumber("abc".to_string()))
        );
        assert_eq!("branch/".parse::<RefSelector>(), Err(SelectorError::EmptyBranch));
        assert!(matches!(
            "tags/v1".parse::<RefSelector>(),
            Err(SelectorError::Unknown(_))
        ));
    }

    #[test]
    fn summary_text() {
        let summary = RefreshSummary {
            installations: 2,
            repositories: 3,
            dispatches: 7,
        };
        assert_eq!(
            summary.to_string(),
            "Updated 2 installations, 3 repositories, 7 branches"
        );
    }

    #[tokio::test]
    async fn branch_refresh_dispatches_matching_pulls() {
        let h = harness(widgets_host(true, false));
        seed_subscription(&h.cache, InstallationId(1), Subscription::new("t", false)).await;

        let outcome = h
            .orchestrator
            .refresh("acme", "widgets", &RefSelector::Branch("main".into()))
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Dispatched(2));
        let jobs = h.queue.jobs();
        let numbers: Vec<u64> = jobs
            .iter()
            .map(|(_, job)| match &job.item {
                WorkItem::EventHandler {
                    event_type,
                    payload,
                    ..
                } => {
                    assert_eq!(*event_type, EventType::Refresh);
                    assert_eq!(payload["installation"]["id"], 1);
                    assert_eq!(payload["repository"]["full_name"], "acme/widgets");
                    payload["pull_request"]["number"].as_u64().unwrap()
                }
                other => panic!("unexpected item {other:?}"),
            })
            .collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn full_refresh_evicts_every_branch() {
        let h = harness(widgets_host(true, false));
        seed_subscription(&h.cache, InstallationId(1), Subscription::new("t", false)).await;
        h.cache
            .set("queues~1~acme~widgets~False~main", "x")
            .await
            .unwrap();

        let outcome = h
            .orchestrator
            .refresh("acme", "widgets", &RefSelector::Full)
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Dispatched(3));
        assert_eq!(
            h.cache.pattern_deletes(),
            vec!["queues~1~acme~widgets~False~*".to_string()]
        );
        assert!(h.cache.get("queues~1~acme~widgets~False~main").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn single_pull_refresh() {
        let h = harness(widgets_host(true, false));
        seed_subscription(&h.cache, InstallationId(1), Subscription::new("t", true)).await;

        let outcome = h
            .orchestrator
            .refresh("acme", "widgets", &RefSelector::Pull(PrNumber(2)))
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Dispatched(1));
        assert!(h.queue.jobs()[0].0.ends_with("-high"));
        assert!(h.cache.pattern_deletes().is_empty());
    }

    #[tokio::test]
    async fn missing_configuration_dispatches_nothing() {
        let h = harness(widgets_host(false, false));
        seed_subscription(&h.cache, InstallationId(1), Subscription::new("t", true)).await;

        let outcome = h
            .orchestrator
            .refresh("acme", "widgets", &RefSelector::Branch("main".into()))
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::NoConfiguration);
        assert!(h.queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn private_repository_without_subscription_is_silent() {
        let h = harness(widgets_host(true, true));
        seed_subscription(&h.cache, InstallationId(1), Subscription::new("t", false)).await;

        let outcome = h
            .orchestrator
            .refresh("acme", "widgets", &RefSelector::Full)
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::NotCovered);
        assert!(h.queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn no_token_is_silent() {
        let h = harness(widgets_host(true, false));

        let outcome = h
            .orchestrator
            .refresh("acme", "widgets", &RefSelector::Full)
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::NotCovered);
        assert!(h.queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn unknown_repository_is_not_installed() {
        let h = harness(FakeHost::new());

        let err = h
            .orchestrator
            .refresh("acme", "nothing", &RefSelector::Full)
            .await
            .unwrap_err();

        assert!(matches!(err, RefreshError::NotInstalled { .. }));
    }

    #[tokio::test]
    async fn missing_pull_is_upstream_error() {
        let h = harness(widgets_host(true, false));
        seed_subscription(&h.cache, InstallationId(1), Subscription::new("t", true)).await;

        let err = h
            .orchestrator
            .refresh("acme", "widgets", &RefSelector::Pull(PrNumber(99)))
            .await
            .unwrap_err();

        assert!(matches!(err, RefreshError::Host(HostError::NotFound(_))));
    }

    #[tokio::test]
    async fn refresh_all_counts() {
        let host = FakeHost::new()
            .with_repo(
                InstallationId(1),
                Repository::new("acme/widgets", false),
                true,
                vec![pull_json(1, "main"), pull_json(2, "main")],
            )
            .with_repo(
                InstallationId(1),
                Repository::new("acme/secret", true),
                true,
                vec![pull_json(1, "main")],
            )
            .with_repo(
                InstallationId(1),
                Repository::new("acme/bare", false),
                false,
                vec![pull_json(1, "main")],
            )
            .with_repo(
                InstallationId(2),
                Repository::new("other/tool", false),
                true,
                vec![pull_json(5, "main")],
            );
        let h = harness(host);
        seed_subscription(&h.cache, InstallationId(1), Subscription::new("t", false)).await;
        // Installation 2 has no cached subscription, hence no token.

        let summary = h.orchestrator.refresh_all().await.unwrap();

        assert_eq!(
            summary,
            RefreshSummary {
                installations: 2,
                repositories: 1,
                dispatches: 2,
            }
        );
        assert_eq!(h.queue.jobs().len(), 2);
    }
}
