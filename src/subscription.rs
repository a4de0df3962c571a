//! Subscription lookup.
//!
//! Subscriptions are computed by the billing side of the platform and cached
//! as JSON under `subscription-cache-{installation_id}`. The router reads
//! them fresh on every request and only ever evicts them.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheStore, subscription_key};
use crate::types::{InstallationId, Subscription};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscription cache unavailable: {0}")]
    Cache(#[from] CacheError),
}

/// Source of subscription facts.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Returns the subscription, or the empty one (no token, not
    /// subscribed) when nothing is known.
    async fn get(&self, installation_id: InstallationId) -> Result<Subscription, SubscriptionError>;

    async fn evict(&self, installation_id: InstallationId) -> Result<(), SubscriptionError>;
}

/// [`SubscriptionStore`] reading the shared cache.
#[derive(Clone)]
pub struct CachedSubscriptions {
    cache: Arc<dyn CacheStore>,
}

impl CachedSubscriptions {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        CachedSubscriptions { cache }
    }
}

#[async_trait]
impl SubscriptionStore for CachedSubscriptions {
    async fn get(&self, installation_id: InstallationId) -> Result<Subscription, SubscriptionError> {
        let key = subscription_key(installation_id);
        let Some(raw) = self.cache.get(&key).await? else {
            debug!(%installation_id, "No cached subscription");
            return Ok(Subscription::default());
        };

        match serde_json::from_str(&raw) {
            Ok(subscription) => Ok(subscription),
            Err(e) => {
                // A corrupt entry is treated like a miss; the owner rewrites it.
                warn!(%installation_id, error = %e, "Unreadable cached subscription");
                Ok(Subscription::default())
            }
        }
    }

    async fn evict(&self, installation_id: InstallationId) -> Result<(), SubscriptionError> {
        self.cache.delete(&subscription_key(installation_id)).await?;
        Ok(())
    }
}
