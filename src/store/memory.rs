//! In-process consistent store.
//!
//! Holds the three coordination keyspaces in memory and fans watch
//! deliveries out to live subscribers. Suitable for tests and single-node
//! deployments; replicated backends implement [`ConsistentStore`] against
//! a real coordination service instead.

use super::{ConsistentStore, Update};
use crate::error::{Result, TreelineError};
use crate::types::{ClusterConfig, ClusterNodeState, NodeId, SignedTreeHead};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// In-memory [`ConsistentStore`] implementation.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    node_states: HashMap<NodeId, ClusterNodeState>,
    cluster_config: Option<ClusterConfig>,
    serving_sth: Option<SignedTreeHead>,
    node_state_watchers: Vec<mpsc::UnboundedSender<Vec<Update<ClusterNodeState>>>>,
    config_watchers: Vec<mpsc::UnboundedSender<Update<ClusterConfig>>>,
    sth_watchers: Vec<mpsc::UnboundedSender<Update<SignedTreeHead>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Write the cluster serving policy and notify watchers.
    ///
    /// In a full deployment this write arrives from an administrative tool,
    /// not from the log nodes themselves.
    pub fn put_cluster_config(&self, config: &ClusterConfig) {
        let mut inner = self.inner.lock();
        inner.cluster_config = Some(config.clone());
        inner
            .config_watchers
            .retain(|tx| tx.send(Update::Existing(config.clone())).is_ok());
    }

    /// Remove one node's cluster state and notify watchers with the
    /// last-known value.
    pub fn remove_cluster_node_state(&self, node_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let prior = inner.node_states.remove(node_id).ok_or_else(|| {
            TreelineError::NotFound(format!("no cluster state for node {}", node_id))
        })?;
        let batch = vec![Update::Removed(prior)];
        inner
            .node_state_watchers
            .retain(|tx| tx.send(batch.clone()).is_ok());
        Ok(())
    }

    /// Remove the cluster-wide serving tree head and notify watchers.
    pub fn remove_serving_sth(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let prior = inner
            .serving_sth
            .take()
            .ok_or_else(|| TreelineError::NotFound("no serving tree head".to_string()))?;
        inner
            .sth_watchers
            .retain(|tx| tx.send(Update::Removed(prior.clone())).is_ok());
        Ok(())
    }

    /// Current serving tree head, if any.
    pub fn serving_sth(&self) -> Option<SignedTreeHead> {
        self.inner.lock().serving_sth.clone()
    }

    /// Current cluster state for the given node, if any.
    pub fn cluster_node_state(&self, node_id: &str) -> Option<ClusterNodeState> {
        self.inner.lock().node_states.get(node_id).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsistentStore for MemoryStore {
    async fn watch_node_states(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<Vec<Update<ClusterNodeState>>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if !inner.node_states.is_empty() {
            let snapshot: Vec<_> = inner
                .node_states
                .values()
                .cloned()
                .map(Update::Existing)
                .collect();
            let _ = tx.send(snapshot);
        }
        inner.node_state_watchers.push(tx);
        debug!(
            watchers = inner.node_state_watchers.len(),
            "node state watch registered"
        );
        Ok(rx)
    }

    async fn watch_cluster_config(&self) -> Result<mpsc::UnboundedReceiver<Update<ClusterConfig>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if let Some(config) = &inner.cluster_config {
            let _ = tx.send(Update::Existing(config.clone()));
        }
        inner.config_watchers.push(tx);
        Ok(rx)
    }

    async fn watch_serving_sth(&self) -> Result<mpsc::UnboundedReceiver<Update<SignedTreeHead>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if let Some(sth) = &inner.serving_sth {
            let _ = tx.send(Update::Existing(sth.clone()));
        }
        inner.sth_watchers.push(tx);
        Ok(rx)
    }

    async fn set_cluster_node_state(&self, state: &ClusterNodeState) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .node_states
            .insert(state.node_id.clone(), state.clone());
        let batch = vec![Update::Existing(state.clone())];
        inner
            .node_state_watchers
            .retain(|tx| tx.send(batch.clone()).is_ok());
        Ok(())
    }

    async fn set_serving_sth(&self, sth: &SignedTreeHead) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.serving_sth = Some(sth.clone());
        inner
            .sth_watchers
            .retain(|tx| tx.send(Update::Existing(sth.clone())).is_ok());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sth(tree_size: u64, timestamp: u64) -> SignedTreeHead {
        SignedTreeHead::new(tree_size, timestamp, vec![0u8; 32], vec![])
    }

    #[tokio::test]
    async fn test_watch_delivers_existing_state_on_subscribe() {
        let store = MemoryStore::new();
        let mut n1 = ClusterNodeState::new("n1");
        n1.newest_sth = Some(sth(10, 100));
        store.set_cluster_node_state(&n1).await.unwrap();

        let mut rx = store.watch_node_states().await.unwrap();
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch, vec![Update::Existing(n1)]);
    }

    #[tokio::test]
    async fn test_watch_delivers_subsequent_writes() {
        let store = MemoryStore::new();
        let mut rx = store.watch_node_states().await.unwrap();

        let n1 = ClusterNodeState::new("n1");
        store.set_cluster_node_state(&n1).await.unwrap();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch, vec![Update::Existing(n1)]);
    }

    #[tokio::test]
    async fn test_removal_carries_prior_value() {
        let store = MemoryStore::new();
        let mut n1 = ClusterNodeState::new("n1");
        n1.contiguous_tree_size = 42;
        store.set_cluster_node_state(&n1).await.unwrap();

        let mut rx = store.watch_node_states().await.unwrap();
        rx.recv().await.unwrap(); // initial snapshot

        store.remove_cluster_node_state("n1").unwrap();
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch, vec![Update::Removed(n1)]);
    }

    #[tokio::test]
    async fn test_remove_unknown_node_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.remove_cluster_node_state("ghost"),
            Err(TreelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_config_watch() {
        let store = MemoryStore::new();
        let mut rx = store.watch_cluster_config().await.unwrap();

        let config = ClusterConfig {
            minimum_serving_nodes: 2,
            minimum_serving_fraction: 0.5,
        };
        store.put_cluster_config(&config);

        assert_eq!(rx.recv().await.unwrap(), Update::Existing(config));
    }

    #[tokio::test]
    async fn test_serving_sth_watch_and_removal() {
        let store = MemoryStore::new();
        store.set_serving_sth(&sth(10, 100)).await.unwrap();

        let mut rx = store.watch_serving_sth().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Update::Existing(sth(10, 100)));

        store.remove_serving_sth().unwrap();
        assert_eq!(rx.recv().await.unwrap(), Update::Removed(sth(10, 100)));
        assert!(store.serving_sth().is_none());
    }

    #[tokio::test]
    async fn test_dropped_watcher_is_pruned() {
        let store = MemoryStore::new();
        let rx = store.watch_node_states().await.unwrap();
        drop(rx);

        // Next write prunes the dead subscriber rather than erroring.
        store
            .set_cluster_node_state(&ClusterNodeState::new("n1"))
            .await
            .unwrap();
        assert_eq!(store.inner.lock().node_state_watchers.len(), 0);
    }
}
