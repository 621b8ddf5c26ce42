//! Signal-driven teardown for the Treeline daemon.
//!
//! The daemon owns one cluster state controller and a handful of auxiliary
//! tasks (the metrics endpoint, for now). [`DaemonShutdown`] collects them
//! and, once a termination signal arrives, tears them down in order: the
//! controller first, so its watches stop mutating state and its publisher
//! drains, then the auxiliary tasks.

use crate::cluster::ClusterStateController;
use tokio::task::JoinHandle;
use tracing::info;

/// Owns the daemon's long-lived pieces and their teardown order.
pub struct DaemonShutdown {
    controller: ClusterStateController,
    aux_tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl DaemonShutdown {
    /// Take ownership of the controller for managed teardown.
    pub fn new(controller: ClusterStateController) -> Self {
        Self {
            controller,
            aux_tasks: Vec::new(),
        }
    }

    /// Register an auxiliary task to be stopped after the controller.
    pub fn register(&mut self, name: &'static str, task: JoinHandle<()>) {
        info!(task = name, "Registered task for managed shutdown");
        self.aux_tasks.push((name, task));
    }

    /// Wait for a termination signal, then run the teardown.
    pub async fn wait_and_run(self) {
        wait_for_signal().await;
        info!("Shutting down Treeline gracefully...");
        self.shutdown_now().await;
    }

    /// Tear the daemon down immediately: the controller first, then the
    /// auxiliary tasks.
    pub async fn shutdown_now(self) {
        self.controller.shutdown().await;

        for (name, task) in self.aux_tasks {
            if !task.is_finished() {
                info!(task = name, "Stopping auxiliary task");
                task.abort();
            }
            let _ = task.await;
        }
    }
}

/// Block until SIGTERM or SIGINT arrives.
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }
}

/// Block until Ctrl+C arrives (Windows version).
#[cfg(windows)]
async fn wait_for_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received Ctrl+C");
}
