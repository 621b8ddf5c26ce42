//! Cluster serving coordination.
//!
//! This module decides what the cluster serves and who speaks for it:
//! - The state controller: watches peer state and computes the largest
//!   tree head the cluster can serve under the configured policy
//! - Master election: only the elected master publishes cluster-wide keys

mod controller;
mod election;

pub use controller::ClusterStateController;
pub use election::{MasterElection, SingleNodeElection};
