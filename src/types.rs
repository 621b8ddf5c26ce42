//! Core type definitions for Treeline.
//!
//! This module contains the value types exchanged between log nodes through
//! the consistent store: signed tree heads, per-node cluster state, and the
//! cluster-wide serving policy.
//!
//! # Key Types
//!
//! - [`SignedTreeHead`]: a signed commitment to the log at a given size
//! - [`ClusterNodeState`]: one node's published view of its own progress
//! - [`ClusterConfig`]: the serving-quorum policy for the whole cluster
//!
//! # Examples
//!
//! ```rust
//! use treeline::types::{ClusterNodeState, SignedTreeHead};
//!
//! let sth = SignedTreeHead::new(1024, 1_700_000_000_000, vec![0u8; 32], vec![]);
//!
//! let mut state = ClusterNodeState::new("node-1");
//! state.newest_sth = Some(sth);
//! state.contiguous_tree_size = 1024;
//! ```

use serde::{Deserialize, Serialize};

/// Opaque identifier for a node in the cluster.
pub type NodeId = String;

/// Number of leaves in a Merkle tree prefix.
pub type TreeSize = u64;

/// A signed commitment to the contents of the log's Merkle tree at a given
/// size and timestamp.
///
/// Equality is by full content. For serving decisions, tree heads are
/// ordered by `tree_size` first and `timestamp` second; the signature and
/// root hash never participate in ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTreeHead {
    /// Number of leaves covered by this tree head.
    pub tree_size: TreeSize,
    /// Issuance time, milliseconds since the UNIX epoch.
    pub timestamp: u64,
    /// SHA-256 root hash of the tree at `tree_size`.
    pub sha256_root_hash: Vec<u8>,
    /// Signature over the tree head by the issuing node's log key.
    pub signature: Vec<u8>,
}

impl SignedTreeHead {
    /// Create a new signed tree head.
    pub fn new(
        tree_size: TreeSize,
        timestamp: u64,
        sha256_root_hash: Vec<u8>,
        signature: Vec<u8>,
    ) -> Self {
        Self {
            tree_size,
            timestamp,
            sha256_root_hash,
            signature,
        }
    }
}

impl std::fmt::Display for SignedTreeHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "STH(size={}, ts={})", self.tree_size, self.timestamp)
    }
}

/// One node's published view of its own serving capability.
///
/// Every node writes its own state to the consistent store under its
/// `node_id`; all nodes observe the full set through the node-state watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNodeState {
    /// Stable identifier for the publishing node.
    pub node_id: NodeId,
    /// Hostname clients can reach this node's log frontend on.
    pub hostname: String,
    /// Port of this node's log frontend.
    pub log_port: u16,
    /// The newest tree head this node has signed, if any.
    pub newest_sth: Option<SignedTreeHead>,
    /// The largest tree prefix this node has fully replicated.
    pub contiguous_tree_size: TreeSize,
}

impl ClusterNodeState {
    /// Create an empty state for the given node.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            hostname: String::new(),
            log_port: 0,
            newest_sth: None,
            contiguous_tree_size: 0,
        }
    }
}

/// Cluster-wide serving policy, distributed through the consistent store.
///
/// A candidate serving tree head qualifies only when the nodes able to
/// serve it satisfy both thresholds at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Minimum absolute number of nodes required to serve a tree head.
    pub minimum_serving_nodes: u64,
    /// Minimum fraction of the cluster required to serve a tree head,
    /// in `[0, 1]`.
    pub minimum_serving_fraction: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            minimum_serving_nodes: 1,
            minimum_serving_fraction: 0.5,
        }
    }
}
