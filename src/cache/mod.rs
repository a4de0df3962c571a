//! Shared key/value cache.
//!
//! The cache is owned by the wider platform; the router reads subscriptions
//! and status messages from it, records test events into it, and evicts
//! queue-state entries when installations change.
//!
//! - [`keys`]: key layout
//! - [`redis`]: production store
//! - [`invalidate`]: pattern-based eviction

use async_trait::async_trait;
use thiserror::Error;

pub mod invalidate;
pub mod keys;
pub mod redis;

pub use invalidate::CacheInvalidator;
pub use keys::{QueuesKey, subscription_key};
pub use self::redis::RedisCache;

/// Errors from the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("cache value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Operations the router needs from the cache.
///
/// Every call is a single atomic operation on the backing store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Deletes every key matching a glob pattern and returns how many went.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    async fn hget(&self, hash: &str, field: &str) -> Result<Option<String>, CacheError>;

    /// Appends to a list.
    async fn push(&self, list: &str, value: &str) -> Result<(), CacheError>;

    /// Reads a whole list and clears it in one step.
    async fn drain(&self, list: &str) -> Result<Vec<String>, CacheError>;
}
