//! Weighted consistent-hash ring.
//!
//! Every physical node of the topology is expanded into `weight` virtual
//! nodes named `address-NNN`. Each virtual node is placed on the ring at
//! [`POINTS_PER_VNODE`] positions so that small weights still spread evenly.
//! A key belongs to the first point at or after its own hash, wrapping at the
//! end of the ring.
//!
//! The ring is built once and never mutated, so lookups need no locking.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

/// Ring positions per virtual node.
pub const POINTS_PER_VNODE: u32 = 40;

/// Static `{address: weight}` map.
pub type Topology = BTreeMap<String, u32>;

/// Errors building a ring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("topology has no nodes with a non-zero weight")]
    Empty,

    #[error("topology node address is empty")]
    EmptyAddress,
}

/// A virtual node: one physical address and its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualNode<'a> {
    pub address: &'a str,
    pub index: u32,
}

impl VirtualNode<'_> {
    /// `address-NNN`.
    pub fn name(&self) -> String {
        format!("{}-{:03}", self.address, self.index)
    }
}

#[derive(Debug, Clone)]
struct RingPoint {
    position: u64,
    node: usize,
    index: u32,
}

/// An immutable consistent-hash ring.
#[derive(Debug, Clone)]
pub struct HashRing {
    addresses: Vec<String>,
    points: Vec<RingPoint>,
}

impl HashRing {
    /// Builds a ring from a topology.
    ///
    /// Nodes with weight 0 take no part. Iteration over the `BTreeMap` is
    /// sorted, so equal topologies always produce identical rings.
    pub fn new(topology: &Topology) -> Result<Self, TopologyError> {
        let mut addresses = Vec::with_capacity(topology.len());
        let mut points = Vec::new();

        for (address, &weight) in topology {
            if address.is_empty() {
                return Err(TopologyError::EmptyAddress);
            }
            if weight == 0 {
                continue;
            }

            let node = addresses.len();
            addresses.push(address.clone());

            for index in 0..weight {
                let vnode = VirtualNode { address, index }.name();
                for replica in 0..POINTS_PER_VNODE {
                    points.push(RingPoint {
                        position: hash_position(format!("{vnode}#{replica}").as_bytes()),
                        node,
                        index,
                    });
                }
            }
        }

        if points.is_empty() {
            return Err(TopologyError::Empty);
        }

        // Ties are broken by label order so the layout stays deterministic.
        points.sort_by(|a, b| {
            (a.position, &addresses[a.node], a.index).cmp(&(b.position, &addresses[b.node], b.index))
        });

        Ok(HashRing { addresses, points })
    }

    /// Returns the virtual node owning `key`.
    pub fn node_for(&self, key: &str) -> VirtualNode<'_> {
        let position = hash_position(key.as_bytes());
        let slot = self.points.partition_point(|p| p.position < position);
        let point = self.points.get(slot).unwrap_or(&self.points[0]);

        VirtualNode {
            address: &self.addresses[point.node],
            index: point.index,
        }
    }

    /// Physical addresses on the ring, sorted.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Total number of ring points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// First eight bytes of SHA-256, big-endian.
fn hash_position(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}
