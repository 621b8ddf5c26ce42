//! Observability for Treeline.
//!
//! Provides logging initialisation, Prometheus metrics, and the gauges the
//! cluster state controller records as its view of the cluster changes.

use crate::config::ObservabilityConfig;
use crate::error::{Result, TreelineError};
use crate::types::TreeSize;
use metrics::gauge;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| TreelineError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| TreelineError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Run the Prometheus metrics server.
pub async fn run_metrics_server(config: ObservabilityConfig) -> Result<()> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| TreelineError::Internal(format!("Failed to install metrics recorder: {}", e)))?;

    register_metrics();

    let app = axum::Router::new()
        .route(
            "/metrics",
            axum::routing::get(move || async move { handle.render() }),
        )
        .route("/health", axum::routing::get(|| async { "OK" }));

    let listener = TcpListener::bind(config.metrics_addr).await?;
    info!(addr = %config.metrics_addr, "Metrics server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| TreelineError::Network(e.to_string()))?;

    Ok(())
}

/// Register standard metrics.
fn register_metrics() {
    gauge!("treeline_cluster_nodes_total").set(0.0);
    gauge!("treeline_serving_tree_size").set(0.0);
    gauge!("treeline_calculated_tree_size").set(0.0);
    gauge!("treeline_election_participation").set(0.0);
    gauge!("treeline_is_master").set(0.0);
}

/// Record the number of nodes visible in the cluster view.
pub fn record_cluster_nodes(nodes: usize) {
    gauge!("treeline_cluster_nodes_total").set(nodes as f64);
}

/// Record the cluster-wide serving tree size, or its absence.
pub fn record_serving_tree_size(tree_size: Option<TreeSize>) {
    gauge!("treeline_serving_tree_size").set(tree_size.unwrap_or(0) as f64);
}

/// Record this node's calculated serving tree size.
pub fn record_calculated_tree_size(tree_size: TreeSize) {
    gauge!("treeline_calculated_tree_size").set(tree_size as f64);
}

/// Record whether this node currently takes part in master election.
pub fn record_election_participation(participating: bool) {
    gauge!("treeline_election_participation").set(if participating { 1.0 } else { 0.0 });
}

/// Record whether this node currently holds mastership.
pub fn record_mastership(master: bool) {
    gauge!("treeline_is_master").set(if master { 1.0 } else { 0.0 });
}
