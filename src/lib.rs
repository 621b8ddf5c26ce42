//! Treeline - cluster serving coordination for Certificate Transparency
//! log nodes.
//!
//! A Certificate Transparency log is served by a cluster of nodes that
//! replicate the same Merkle tree at different speeds. Treeline is the
//! per-node coordination layer that decides what the cluster as a whole
//! can safely serve: each node publishes its own replication progress to a
//! consistent store, observes its peers through store watches, computes
//! the largest signed tree head (STH) enough of the cluster can back, and
//! lets only the elected master publish that decision cluster-wide.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Treeline node                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Cluster State Controller: watch fan-in | serving quorum     │
//! │  calculation | election participation | publisher task       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Consistent Store: node states | cluster config | serving STH│
//! ├──────────────────────────────────────────────────────────────┤
//! │  Master Election: one writer for cluster-wide keys           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use treeline::config::TreelineConfig;
//!
//! #[tokio::main]
//! async fn main() -> treeline::Result<()> {
//!     let config = TreelineConfig::development();
//!     treeline::run(config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod cli;
pub mod cluster;
pub mod observability;
pub mod shutdown;
pub mod store;

// Re-exports
pub use error::{Result, TreelineError};
pub use types::*;

use cluster::{ClusterStateController, MasterElection, SingleNodeElection};
use config::TreelineConfig;
use shutdown::DaemonShutdown;
use std::sync::Arc;
use store::{ConsistentStore, MemoryStore};
use tracing::{error, info};

/// Run a Treeline node with the given configuration.
pub async fn run(config: TreelineConfig) -> Result<()> {
    observability::init(&config.observability)?;

    info!(node_id = %config.node.id, "Starting Treeline node");

    let store = Arc::new(MemoryStore::new());
    store.put_cluster_config(&config.serving);

    let election: Arc<dyn MasterElection> = Arc::new(SingleNodeElection::new());
    let controller = ClusterStateController::start(
        config.node.id.clone(),
        Arc::clone(&store) as Arc<dyn ConsistentStore>,
        election,
    )
    .await?;
    controller
        .set_node_host_port(config.node.hostname.clone(), config.node.log_port)
        .await;

    let mut shutdown = DaemonShutdown::new(controller);

    if config.observability.metrics_enabled {
        info!(addr = %config.observability.metrics_addr, "Starting metrics server");
        let obs_config = config.observability.clone();
        shutdown.register(
            "metrics",
            tokio::spawn(async move {
                if let Err(e) = observability::run_metrics_server(obs_config).await {
                    error!("Metrics server error: {}", e);
                }
            }),
        );
    }

    shutdown.wait_and_run().await;

    info!("Treeline shutdown complete");
    Ok(())
}
