//! Shardhook: GitHub webhook intake for a fleet of merge-queue workers.
//!
//! Deliveries are authenticated, classified, and either dropped, turned into
//! cache invalidations, or pushed as jobs onto the queue of the worker node
//! that owns the repository on a consistent-hash ring.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod github;
pub mod queue;
pub mod refresh;
pub mod server;
pub mod shard;
pub mod subscription;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
