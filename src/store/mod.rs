//! Consistent store contract.
//!
//! The cluster shares three keyspaces through a consistent, watchable
//! key-value store: per-node cluster state, the cluster serving policy, and
//! the cluster-wide serving tree head. This module defines the contract the
//! rest of the crate programs against; [`MemoryStore`] is the in-process
//! implementation used by tests and single-node deployments, and the trait
//! is the seam where a replicated backend plugs in.
//!
//! Watches deliver the current value on subscription and every subsequent
//! change. Intermediate values may be coalesced: subscribers must be
//! correct against a latest-state-only delivery model.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{ClusterConfig, ClusterNodeState, SignedTreeHead};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A single watch delivery for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Update<T> {
    /// The key exists; the value is its current content.
    Existing(T),
    /// The key was removed; the value is its last-known content, so the
    /// key can still be extracted by the receiver.
    Removed(T),
}

impl<T> Update<T> {
    /// The carried value, regardless of existence.
    pub fn value(&self) -> &T {
        match self {
            Update::Existing(value) | Update::Removed(value) => value,
        }
    }
}

/// The consistent store the cluster coordinates through.
///
/// Implementations must be safe to share across tasks. Watch receivers stay
/// live for the lifetime of the subscription; dropping a receiver ends it.
#[async_trait]
pub trait ConsistentStore: Send + Sync {
    /// Watch the per-node cluster state keyspace. Deliveries are batches of
    /// per-key updates.
    async fn watch_node_states(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<Vec<Update<ClusterNodeState>>>>;

    /// Watch the cluster serving policy.
    async fn watch_cluster_config(&self) -> Result<mpsc::UnboundedReceiver<Update<ClusterConfig>>>;

    /// Watch the cluster-wide serving tree head.
    async fn watch_serving_sth(&self) -> Result<mpsc::UnboundedReceiver<Update<SignedTreeHead>>>;

    /// Upsert one node's cluster state, keyed by its `node_id`.
    async fn set_cluster_node_state(&self, state: &ClusterNodeState) -> Result<()>;

    /// Upsert the cluster-wide serving tree head. Only the current master
    /// should call this.
    async fn set_serving_sth(&self, sth: &SignedTreeHead) -> Result<()>;
}
