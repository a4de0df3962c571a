//! Shard resolution: repository slug to queue name.
//!
//! ```text
//!   "acme/widgets" ──hash──► ring ──► worker1.example.net-003 ──► worker1.example.net-high
//!                                      (virtual node)              (address + priority)
//! ```
//!
//! The same slug always lands on the same queue for a fixed topology, so all
//! events of one repository are consumed in submission order. The ring is
//! built at startup and shared read-only; changing the topology needs a
//! restart.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod priority;
pub mod ring;

pub use priority::QueuePriority;
pub use ring::{HashRing, POINTS_PER_VNODE, Topology, TopologyError, VirtualNode};

use crate::types::Subscription;

/// The resolved destination of a work item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    /// Physical node address.
    pub node: String,

    /// Virtual node index on that address. Informational only.
    pub vnode: u32,

    pub priority: QueuePriority,
}

impl QueueKey {
    /// Queue name: `{node}-{priority}`.
    pub fn queue_name(&self) -> String {
        format!("{}-{}", self.node, self.priority)
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.node, self.priority)
    }
}

/// Maps routing slugs onto queues.
#[derive(Debug, Clone)]
pub struct ShardResolver {
    ring: HashRing,
}

impl ShardResolver {
    pub fn new(ring: HashRing) -> Self {
        ShardResolver { ring }
    }

    pub fn from_topology(topology: &Topology) -> Result<Self, TopologyError> {
        HashRing::new(topology).map(ShardResolver::new)
    }

    /// Resolves the queue for a slug (repository full name or installation
    /// id) under a subscription.
    pub fn resolve(&self, slug: &str, subscription: &Subscription) -> QueueKey {
        let vnode = self.ring.node_for(slug);
        QueueKey {
            node: vnode.address.to_string(),
            vnode: vnode.index,
            priority: QueuePriority::for_subscription(subscription),
        }
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }
}
