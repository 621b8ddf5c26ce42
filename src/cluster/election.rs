//! Master election contract.
//!
//! Exactly one node in the cluster — the master — may write cluster-wide
//! keys such as the serving tree head. The election mechanism itself is a
//! blackbox behind [`MasterElection`]: the controller only expresses intent
//! to participate and samples mastership.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// The leader-election primitive the controller coordinates with.
///
/// `start_election` and `stop_election` are idempotent intent flips and
/// must not block. `is_master` is a snapshot: the answer may change
/// immediately after the call returns, so callers re-check at every
/// decision point that matters.
pub trait MasterElection: Send + Sync {
    /// Join (or remain in) the election.
    fn start_election(&self);

    /// Leave (or remain out of) the election.
    fn stop_election(&self);

    /// Whether this node currently holds mastership.
    fn is_master(&self) -> bool;
}

/// Election for single-node deployments: the node is master exactly while
/// it participates.
pub struct SingleNodeElection {
    participating: AtomicBool,
}

impl SingleNodeElection {
    pub fn new() -> Self {
        Self {
            participating: AtomicBool::new(false),
        }
    }
}

impl Default for SingleNodeElection {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterElection for SingleNodeElection {
    fn start_election(&self) {
        if !self.participating.swap(true, Ordering::SeqCst) {
            info!("joined election; assuming mastership");
        }
    }

    fn stop_election(&self) {
        if self.participating.swap(false, Ordering::SeqCst) {
            info!("left election; relinquished mastership");
        }
    }

    fn is_master(&self) -> bool {
        self.participating.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_follows_participation() {
        let election = SingleNodeElection::new();
        assert!(!election.is_master());

        election.start_election();
        assert!(election.is_master());

        election.stop_election();
        assert!(!election.is_master());
    }

    #[test]
    fn test_intent_flips_are_idempotent() {
        let election = SingleNodeElection::new();

        election.start_election();
        election.start_election();
        assert!(election.is_master());

        election.stop_election();
        election.stop_election();
        assert!(!election.is_master());
    }
}
