//! Shared test utilities: in-memory collaborators and proptest generators.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::{Value, json};

use crate::cache::{CacheError, CacheStore, subscription_key};
use crate::github::{HostError, SourceHost};
use crate::queue::{Job, JobQueue, QueueError};
use crate::subscription::{SubscriptionError, SubscriptionStore};
use crate::types::{InstallationId, PrNumber, Repository, Subscription};
use crate::webhooks::{compute_signature, format_signature_header};

pub fn arb_slug() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9-]{1,20}/[a-zA-Z0-9._-]{1,30}".prop_map(String::from)
}

pub fn arb_subscription() -> impl Strategy<Value = Subscription> {
    (prop::option::of("[a-z0-9]{0,12}"), any::<bool>())
        .prop_map(|(token, subscribed)| Subscription { token, subscribed })
}

/// `sha1=<hex>` header for `body` under `secret`.
pub fn sign_body(body: &[u8], secret: &[u8]) -> String {
    format_signature_header(&compute_signature(body, secret))
}

pub async fn seed_subscription(
    cache: &MemoryCache,
    installation_id: InstallationId,
    subscription: Subscription,
) {
    let raw = serde_json::to_string(&subscription).unwrap();
    cache
        .set(&subscription_key(installation_id), &raw)
        .await
        .unwrap();
}

/// A pull request object as the REST API returns it (trimmed).
pub fn pull_json(number: u64, base: &str) -> Value {
    json!({
        "number": number,
        "state": "open",
        "base": { "ref": base },
        "head": { "ref": format!("topic-{number}") }
    })
}

/// Matches a Redis-style glob where `*` is the only metacharacter.
fn glob_matches(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let (first, rest) = parts.split_first().unwrap();
    let (last, middle) = rest.split_last().unwrap();
    let Some(mut remaining) = key.strip_prefix(first) else {
        return false;
    };
    for part in middle {
        match remaining.find(part) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}

#[derive(Default)]
struct MemoryCacheState {
    values: BTreeMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, Vec<String>>,
    pattern_deletes: Vec<String>,
}

/// In-memory [`CacheStore`].
#[derive(Default)]
pub struct MemoryCache {
    state: Mutex<MemoryCacheState>,
}

impl MemoryCache {
    /// Plain keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().values.keys().cloned().collect()
    }

    /// Patterns passed to `delete_pattern`, in call order.
    pub fn pattern_deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().pattern_deletes.clone()
    }

    pub fn set_hash_field(&self, hash: &str, field: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .hashes
            .entry(hash.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    pub fn list(&self, list: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .lists
            .get(list)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.state.lock().unwrap().values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.state
            .lock()
            .unwrap()
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();
        state.values.remove(key);
        state.lists.remove(key);
        state.hashes.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut state = self.state.lock().unwrap();
        state.pattern_deletes.push(pattern.to_string());
        let before = state.values.len();
        state.values.retain(|key, _| !glob_matches(pattern, key));
        Ok((before - state.values.len()) as u64)
    }

    async fn hget(&self, hash: &str, field: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .hashes
            .get(hash)
            .and_then(|h| h.get(field))
            .cloned())
    }

    async fn push(&self, list: &str, value: &str) -> Result<(), CacheError> {
        self.state
            .lock()
            .unwrap()
            .lists
            .entry(list.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn drain(&self, list: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .lists
            .remove(list)
            .unwrap_or_default())
    }
}

/// [`JobQueue`] that records every job.
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<(String, Job)>>,
    fail: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue whose backend is unreachable.
    pub fn failing() -> Self {
        RecordingQueue {
            jobs: Mutex::default(),
            fail: true,
        }
    }

    pub fn jobs(&self) -> Vec<(String, Job)> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, queue: &str, job: &Job) -> Result<(), QueueError> {
        if self.fail {
            let refused =
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "backend unreachable");
            return Err(QueueError::Backend(refused.into()));
        }
        self.jobs
            .lock()
            .unwrap()
            .push((queue.to_string(), job.clone()));
        Ok(())
    }
}

/// [`SubscriptionStore`] that always answers the same subscription, as if
/// the billing side repopulated it right after every eviction.
pub struct FixedSubscriptions {
    subscription: Subscription,
    evictions: Mutex<Vec<InstallationId>>,
}

impl FixedSubscriptions {
    pub fn new(subscription: Subscription) -> Self {
        FixedSubscriptions {
            subscription,
            evictions: Mutex::default(),
        }
    }

    pub fn evictions(&self) -> Vec<InstallationId> {
        self.evictions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionStore for FixedSubscriptions {
    async fn get(&self, _installation_id: InstallationId) -> Result<Subscription, SubscriptionError> {
        Ok(self.subscription.clone())
    }

    async fn evict(&self, installation_id: InstallationId) -> Result<(), SubscriptionError> {
        self.evictions.lock().unwrap().push(installation_id);
        Ok(())
    }
}

struct FakeRepo {
    installation: InstallationId,
    repository: Repository,
    has_config: bool,
    pulls: Vec<Value>,
}

/// Scripted [`SourceHost`].
#[derive(Default)]
pub struct FakeHost {
    repos: Vec<FakeRepo>,
    calls: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(
        mut self,
        installation: InstallationId,
        repository: Repository,
        has_config: bool,
        pulls: Vec<Value>,
    ) -> Self {
        self.repos.push(FakeRepo {
            installation,
            repository,
            has_config,
            pulls,
        });
        self
    }

    /// Number of host calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn find(&self, full_name: &str) -> Result<&FakeRepo, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.repos
            .iter()
            .find(|r| r.repository.full_name.eq_ignore_ascii_case(full_name))
            .ok_or_else(|| HostError::NotFound(full_name.to_string()))
    }
}

#[async_trait]
impl SourceHost for FakeHost {
    async fn repository_installation(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<InstallationId>, HostError> {
        Ok(self
            .find(&format!("{owner}/{repo}"))
            .ok()
            .map(|r| r.installation))
    }

    async fn repository(
        &self,
        _installation: InstallationId,
        owner: &str,
        repo: &str,
    ) -> Result<Repository, HostError> {
        Ok(self.find(&format!("{owner}/{repo}"))?.repository.clone())
    }

    async fn has_config_file(
        &self,
        _installation: InstallationId,
        repository: &Repository,
        _path: &str,
    ) -> Result<bool, HostError> {
        Ok(self.find(&repository.full_name)?.has_config)
    }

    async fn open_pulls(
        &self,
        _installation: InstallationId,
        repository: &Repository,
        base: Option<&str>,
    ) -> Result<Vec<Value>, HostError> {
        let repo = self.find(&repository.full_name)?;
        Ok(repo
            .pulls
            .iter()
            .filter(|p| base.is_none_or(|b| p["base"]["ref"] == b))
            .cloned()
            .collect())
    }

    async fn pull(
        &self,
        _installation: InstallationId,
        repository: &Repository,
        number: PrNumber,
    ) -> Result<Value, HostError> {
        let repo = self.find(&repository.full_name)?;
        repo.pulls
            .iter()
            .find(|p| p["number"] == number.0)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("{}{}", repository.full_name, number)))
    }

    async fn installations(&self) -> Result<Vec<InstallationId>, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut ids: Vec<InstallationId> = self.repos.iter().map(|r| r.installation).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn installation_repositories(
        &self,
        installation: InstallationId,
    ) -> Result<Vec<Repository>, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .repos
            .iter()
            .filter(|r| r.installation == installation)
            .map(|r| r.repository.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::glob_matches;

    #[test]
    fn glob() {
        assert!(glob_matches("queues~1~*~*~*~*", "queues~1~acme~widgets~False~main"));
        assert!(glob_matches("queues~1~acme~widgets~*~*", "queues~1~acme~widgets~True~dev"));
        assert!(!glob_matches("queues~1~*~*~*~*", "queues~12~acme~widgets~False~main"));
        assert!(!glob_matches("queues~1~acme~widgets~*~*", "queues~1~acme~gadgets~False~main"));
        assert!(glob_matches("exact", "exact"));
        assert!(!glob_matches("exact", "exactly"));
    }
}
