//! Cluster state controller.
//!
//! Each log node runs one [`ClusterStateController`]. It watches the
//! consistent store for peer node states, the cluster serving policy, and
//! the cluster-wide serving tree head; publishes this node's own state;
//! computes the largest tree head the cluster can serve under the policy;
//! and decides whether this node should participate in master election.
//! A dedicated publisher task pushes the computed tree head to the store
//! while this node is master.

use super::election::MasterElection;
use crate::error::{Result, TreelineError};
use crate::observability;
use crate::store::{ConsistentStore, Update};
use crate::types::{ClusterConfig, ClusterNodeState, NodeId, SignedTreeHead, TreeSize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Controller state. All fields are guarded by the single mutex in
/// [`ControllerShared`]; every mutation happens under it.
struct ControllerState {
    /// This node's published view of itself.
    local: ClusterNodeState,
    /// Last-known state of every node in the cluster, self included once
    /// a push has round-tripped through the store.
    all_node_states: HashMap<NodeId, ClusterNodeState>,
    /// Serving policy; absent until the first watch delivery.
    cluster_config: Option<ClusterConfig>,
    /// The tree head the store currently advertises as cluster-wide
    /// serving. Mirrors the store; never invented locally.
    actual_serving_sth: Option<SignedTreeHead>,
    /// This node's candidate for the serving tree head. Monotonic in
    /// tree size for the lifetime of the controller.
    calculated_serving_sth: Option<SignedTreeHead>,
    /// The publisher has an un-dispatched calculated tree head.
    update_required: bool,
    /// Shutdown has begun; the publisher exits on its next wake.
    exiting: bool,
}

impl ControllerState {
    fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            local: ClusterNodeState::new(node_id),
            all_node_states: HashMap::new(),
            cluster_config: None,
            actual_serving_sth: None,
            calculated_serving_sth: None,
            update_required: false,
            exiting: false,
        }
    }
}

struct ControllerShared {
    store: Arc<dyn ConsistentStore>,
    election: Arc<dyn MasterElection>,
    state: Mutex<ControllerState>,
    publisher_wake: Notify,
}

/// Per-node coordinator of cluster serving state.
///
/// Constructed with [`start`](Self::start), which registers the store
/// watches and spawns the publisher before returning. Torn down with
/// [`shutdown`](Self::shutdown).
pub struct ClusterStateController {
    shared: Arc<ControllerShared>,
    watch_tasks: Vec<JoinHandle<()>>,
    publisher: JoinHandle<()>,
}

impl ClusterStateController {
    /// Start a controller for the given node.
    ///
    /// All three store watches are registered before this returns; the
    /// first deliveries may or may not have arrived yet.
    pub async fn start(
        node_id: impl Into<NodeId>,
        store: Arc<dyn ConsistentStore>,
        election: Arc<dyn MasterElection>,
    ) -> Result<Self> {
        let shared = Arc::new(ControllerShared {
            store: Arc::clone(&store),
            election,
            state: Mutex::new(ControllerState::new(node_id)),
            publisher_wake: Notify::new(),
        });

        let publisher = tokio::spawn(Self::run_publisher(Arc::clone(&shared)));

        let mut node_states_rx = store.watch_node_states().await?;
        let mut config_rx = store.watch_cluster_config().await?;
        let mut sth_rx = store.watch_serving_sth().await?;

        let mut watch_tasks = Vec::with_capacity(3);

        let s = Arc::clone(&shared);
        watch_tasks.push(tokio::spawn(async move {
            while let Some(batch) = node_states_rx.recv().await {
                s.on_node_states_updated(batch).await;
            }
            debug!("node state watch ended");
        }));

        let s = Arc::clone(&shared);
        watch_tasks.push(tokio::spawn(async move {
            while let Some(update) = config_rx.recv().await {
                s.on_cluster_config_updated(update).await;
            }
            debug!("cluster config watch ended");
        }));

        let s = Arc::clone(&shared);
        watch_tasks.push(tokio::spawn(async move {
            while let Some(update) = sth_rx.recv().await {
                s.on_serving_sth_updated(update).await;
            }
            debug!("serving tree head watch ended");
        }));

        Ok(Self {
            shared,
            watch_tasks,
            publisher,
        })
    }

    /// Record a tree head this node has just signed.
    ///
    /// # Panics
    ///
    /// Panics if `sth.timestamp` is older than the previously recorded
    /// tree head's timestamp. Timestamps must be non-decreasing; handing
    /// in an older tree head is a bug in the signing pipeline.
    pub async fn new_tree_head(&self, sth: SignedTreeHead) {
        let mut state = self.shared.state.lock().await;
        if let Some(prev) = &state.local.newest_sth {
            assert!(
                sth.timestamp >= prev.timestamp,
                "tree head timestamp regressed: {} -> {}",
                prev.timestamp,
                sth.timestamp
            );
        }
        state.local.newest_sth = Some(sth);
        self.shared.push_local_node_state(&mut state).await;
    }

    /// Record replication progress: the largest tree prefix this node has
    /// fully replicated.
    ///
    /// # Panics
    ///
    /// Panics if `new_size` is smaller than the previously recorded size.
    pub async fn contiguous_tree_size_updated(&self, new_size: TreeSize) {
        let mut state = self.shared.state.lock().await;
        assert!(
            new_size >= state.local.contiguous_tree_size,
            "contiguous tree size regressed: {} -> {}",
            state.local.contiguous_tree_size,
            new_size
        );
        state.local.contiguous_tree_size = new_size;
        self.shared.push_local_node_state(&mut state).await;
    }

    /// Set the host and port peers should contact this node's log
    /// frontend on.
    pub async fn set_node_host_port(&self, hostname: impl Into<String>, port: u16) {
        let mut state = self.shared.state.lock().await;
        state.local.hostname = hostname.into();
        state.local.log_port = port;
        self.shared.push_local_node_state(&mut state).await;
    }

    /// This node's candidate for the cluster serving tree head.
    pub async fn calculated_serving_sth(&self) -> Result<SignedTreeHead> {
        self.shared
            .state
            .lock()
            .await
            .calculated_serving_sth
            .clone()
            .ok_or_else(|| TreelineError::NotFound("no calculated serving tree head".to_string()))
    }

    /// This node's current published view of itself.
    pub async fn local_node_state(&self) -> ClusterNodeState {
        self.shared.state.lock().await.local.clone()
    }

    /// Tear the controller down: cancel the watches, stop the publisher,
    /// and drain all tasks.
    ///
    /// Watches are cancelled first so no new state mutations arrive while
    /// the publisher winds down.
    pub async fn shutdown(mut self) {
        for task in &self.watch_tasks {
            task.abort();
        }
        {
            let mut state = self.shared.state.lock().await;
            state.exiting = true;
        }
        self.shared.publisher_wake.notify_one();
        let _ = self.publisher.await;
        for task in self.watch_tasks.drain(..) {
            let _ = task.await;
        }
        debug!("cluster state controller stopped");
    }

    /// Publisher task body. Owns the write path from the calculated
    /// serving tree head to the store.
    async fn run_publisher(shared: Arc<ControllerShared>) {
        loop {
            {
                let mut state = shared.state.lock().await;
                if state.exiting {
                    return;
                }
                if state.update_required {
                    let sth = state
                        .calculated_serving_sth
                        .clone()
                        .expect("update required without a calculated tree head");
                    state.update_required = false;
                    // Release the mutex before the store write so watch
                    // deliveries keep flowing while the write is in flight.
                    drop(state);

                    // Mastership may have been lost since the update was
                    // requested; if so the new master owns publication.
                    let master = shared.election.is_master();
                    observability::record_mastership(master);
                    if master {
                        info!(%sth, "publishing serving tree head");
                        if let Err(e) = shared.store.set_serving_sth(&sth).await {
                            warn!(error = %e, retryable = e.is_retryable(), "failed to publish serving tree head");
                        }
                    } else {
                        debug!(%sth, "mastership lost before dispatch; dropping update");
                    }
                    continue;
                }
            }
            shared.publisher_wake.notified().await;
        }
    }
}

impl ControllerShared {
    /// Merge a batch of per-node updates into the cluster view, then
    /// recompute the serving tree head.
    async fn on_node_states_updated(&self, updates: Vec<Update<ClusterNodeState>>) {
        let mut state = self.state.lock().await;
        for update in updates {
            match update {
                Update::Existing(node) => {
                    debug!(node_id = %node.node_id, "cluster state updated");
                    state.all_node_states.insert(node.node_id.clone(), node);
                }
                Update::Removed(node) => {
                    debug!(node_id = %node.node_id, "cluster state removed");
                    let removed = state.all_node_states.remove(&node.node_id);
                    assert!(
                        removed.is_some(),
                        "watch removed unknown node {}",
                        node.node_id
                    );
                }
            }
        }
        observability::record_cluster_nodes(state.all_node_states.len());

        self.calculate_serving_sth(&mut state);
    }

    /// Replace the serving policy and recompute under it.
    async fn on_cluster_config_updated(&self, update: Update<ClusterConfig>) {
        let mut state = self.state.lock().await;
        let config = match update {
            Update::Removed(_) => {
                warn!("no cluster config exists");
                return;
            }
            Update::Existing(config) => config,
        };

        info!(
            minimum_serving_nodes = config.minimum_serving_nodes,
            minimum_serving_fraction = config.minimum_serving_fraction,
            "received new cluster config"
        );
        state.cluster_config = Some(config);

        self.calculate_serving_sth(&mut state);
    }

    /// Mirror the store's serving tree head, then reassess whether this
    /// node may hold mastership.
    async fn on_serving_sth_updated(&self, update: Update<SignedTreeHead>) {
        let mut state = self.state.lock().await;
        match update {
            Update::Removed(_) => {
                warn!("cluster has no serving tree head");
                state.actual_serving_sth = None;
                observability::record_serving_tree_size(None);
            }
            Update::Existing(sth) => {
                info!(%sth, "received new serving tree head");
                observability::record_serving_tree_size(Some(sth.tree_size));
                state.actual_serving_sth = Some(sth);
            }
        }

        self.determine_election_participation(&mut state);
    }

    /// Publish this node's state to the store. Must be called with the
    /// state mutex held.
    ///
    /// Election participation is reassessed first: a change in replication
    /// progress can newly qualify or disqualify this node as master. A
    /// failed store write is logged and swallowed; the next push retries.
    async fn push_local_node_state(&self, state: &mut ControllerState) {
        self.determine_election_participation(state);

        if let Err(e) = self.store.set_cluster_node_state(&state.local).await {
            warn!(error = %e, retryable = e.is_retryable(), "failed to publish local node state");
        }
    }

    /// Recompute the largest tree head the cluster can serve.
    ///
    /// Walks candidate sizes from largest to smallest, accumulating the
    /// node count: a node holding a tree head of size S can serve any size
    /// up to S. The walk never descends below the previously calculated
    /// size, so the calculated tree head is monotonic in size. When no
    /// candidate satisfies the policy the previous value is retained.
    fn calculate_serving_sth(&self, state: &mut ControllerState) {
        debug!("recalculating serving tree head");
        let Some(config) = state.cluster_config.clone() else {
            debug!("no cluster config received yet; skipping");
            return;
        };

        let mut nodes_at_size: BTreeMap<TreeSize, usize> = BTreeMap::new();
        let mut newest_at_size: BTreeMap<TreeSize, SignedTreeHead> = BTreeMap::new();
        for node in state.all_node_states.values() {
            let Some(sth) = &node.newest_sth else { continue };
            *nodes_at_size.entry(sth.tree_size).or_default() += 1;
            match newest_at_size.entry(sth.tree_size) {
                Entry::Vacant(slot) => {
                    slot.insert(sth.clone());
                }
                Entry::Occupied(mut slot) => {
                    if sth.timestamp > slot.get().timestamp {
                        slot.insert(sth.clone());
                    }
                }
            }
        }

        let floor = state
            .calculated_serving_sth
            .as_ref()
            .map_or(0, |sth| sth.tree_size);
        let total_nodes = state.all_node_states.len();

        let mut nodes_seen = 0;
        for (&size, &count) in nodes_at_size.iter().rev() {
            if size < floor {
                break;
            }
            nodes_seen += count;
            let serving_fraction = nodes_seen as f64 / total_nodes as f64;
            if serving_fraction >= config.minimum_serving_fraction
                && nodes_seen as u64 >= config.minimum_serving_nodes
            {
                let chosen = newest_at_size
                    .remove(&size)
                    .expect("counted size has a newest tree head");
                if state.calculated_serving_sth.as_ref() == Some(&chosen) {
                    debug!(%chosen, "serving tree head unchanged");
                    return;
                }
                info!(
                    tree_size = size,
                    nodes = nodes_seen,
                    percent = serving_fraction * 100.0,
                    "serving tree head selected"
                );
                observability::record_calculated_tree_size(chosen.tree_size);
                state.calculated_serving_sth = Some(chosen);
                let master = self.election.is_master();
                observability::record_mastership(master);
                if master {
                    state.update_required = true;
                    self.publisher_wake.notify_one();
                }
                return;
            }
        }
        warn!("insufficient node coverage for any serving tree head");
    }

    /// Decide whether this node should take part in master election.
    ///
    /// A node behind on replication cannot author tree heads extending the
    /// one the cluster serves, so it withdraws until it catches up.
    fn determine_election_participation(&self, state: &mut ControllerState) {
        let Some(actual) = &state.actual_serving_sth else {
            warn!("cluster has no serving tree head; leaving election");
            self.election.stop_election();
            observability::record_election_participation(false);
            return;
        };

        if actual.tree_size > state.local.contiguous_tree_size {
            info!(
                serving_tree_size = actual.tree_size,
                contiguous_tree_size = state.local.contiguous_tree_size,
                "local replication behind serving tree head; leaving election"
            );
            self.election.stop_election();
            observability::record_election_participation(false);
            return;
        }

        self.election.start_election();
        observability::record_election_participation(true);
    }
}
