//! Eviction of cached queue state.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::keys::QueuesKey;
use super::{CacheError, CacheStore};

/// Deletes queue-state cache entries.
///
/// Invalidation is a plain delete with no read-modify-write, so repeating it
/// is harmless.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn CacheStore>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        CacheInvalidator { cache }
    }

    /// Evicts every entry the key covers.
    ///
    /// Returns the number of entries removed by a pattern delete; exact keys
    /// always report 0.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn invalidate(&self, key: &QueuesKey) -> Result<u64, CacheError> {
        let rendered = key.to_string();
        if key.is_pattern() {
            let deleted = self.cache.delete_pattern(&rendered).await?;
            debug!(deleted, "Evicted queue state by pattern");
            Ok(deleted)
        } else {
            self.cache.delete(&rendered).await?;
            debug!("Evicted queue state");
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryCache;
    use crate::types::{InstallationId, Repository};

    async fn seeded() -> Arc<MemoryCache> {
        let cache = Arc::new(MemoryCache::default());
        for key in [
            "queues~1~acme~widgets~False~main",
            "queues~1~acme~widgets~False~dev",
            "queues~1~acme~gadgets~True~main",
            "queues~2~other~repo~False~main",
            "subscription-cache-1",
        ] {
            cache.set(key, "x").await.unwrap();
        }
        cache
    }

    #[tokio::test]
    async fn installation_scope_evicts_only_that_installation() {
        let cache = seeded().await;
        let invalidator = CacheInvalidator::new(cache.clone());

        let deleted = invalidator
            .invalidate(&QueuesKey::installation(InstallationId(1)))
            .await
            .unwrap();

        assert_eq!(deleted, 3);
        assert_eq!(
            cache.keys(),
            vec![
                "queues~2~other~repo~False~main".to_string(),
                "subscription-cache-1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn repository_scope_evicts_all_branches() {
        let cache = seeded().await;
        let invalidator = CacheInvalidator::new(cache.clone());

        invalidator
            .invalidate(&QueuesKey::repository(InstallationId(1), "ACME", "Widgets"))
            .await
            .unwrap();

        assert!(cache.get("queues~1~acme~widgets~False~main").await.unwrap().is_none());
        assert!(cache.get("queues~1~acme~widgets~False~dev").await.unwrap().is_none());
        assert!(cache.get("queues~1~acme~gadgets~True~main").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn exact_key_uses_plain_delete() {
        let cache = seeded().await;
        let invalidator = CacheInvalidator::new(cache.clone());
        let repo = Repository::new("acme/widgets", false);

        invalidator
            .invalidate(&QueuesKey::branch(InstallationId(1), &repo, Some("main")))
            .await
            .unwrap();

        assert!(cache.get("queues~1~acme~widgets~False~main").await.unwrap().is_none());
        assert!(cache.get("queues~1~acme~widgets~False~dev").await.unwrap().is_some());
        assert_eq!(cache.pattern_deletes(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn invalidation_is_idempotent() {
        let cache = seeded().await;
        let invalidator = CacheInvalidator::new(cache.clone());
        let key = QueuesKey::repository(InstallationId(1), "acme", "widgets");

        invalidator.invalidate(&key).await.unwrap();
        let after_once = cache.keys();

        let second = invalidator.invalidate(&key).await.unwrap();
        assert_eq!(second, 0);
        assert_eq!(cache.keys(), after_once);
    }
}
