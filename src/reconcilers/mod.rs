// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation controllers for the infrastructure resources.
//!
//! Each reconciler watches its kind and drives DigitalOcean towards the
//! declared state.
//!
//! # Reconciliation Architecture
//!
//! Every reconciler follows the same contract:
//!
//! 1. **Fetch** - Load the object, its owner `Cluster`/`Machine` and peers
//! 2. **Scope** - Bundle them with the cloud services into a scope and snapshot
//!    the object with a [`PatchHelper`](crate::scope::PatchHelper)
//! 3. **Reconcile** - Run the delete branch when a deletion timestamp is set,
//!    the normal branch otherwise
//! 4. **Patch** - Write back metadata, spec and status changes in one flush
//! 5. **Events** - Publish the events queued during the reconcile
//!
//! The normal and delete branches only touch the scope, so they run against the
//! in-memory fake cloud in unit tests.
//!
//! # Available Reconcilers
//!
//! - [`docluster`] - API server load balancer, endpoint and DNS record
//! - [`domachine`] - Droplets, their data-disk volumes and tags
//! - [`doks`] - Managed clusters, their kubeconfig and node pools

pub mod docluster;
pub mod doks;
pub mod domachine;
pub mod finalizers;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use docluster::reconcile_docluster;
pub use doks::{reconcile_doks_cluster, reconcile_doks_control_plane, reconcile_doks_node_pool};
pub use domachine::reconcile_domachine;

use kube::runtime::controller::Action;
use std::time::Duration;

/// Result of a successful reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Converged; check again after the sync period.
    Done,
    /// Waiting on the cloud; check again after the delay.
    RequeueAfter(Duration),
}

impl Outcome {
    #[must_use]
    pub fn requeue_secs(secs: u64) -> Self {
        Self::RequeueAfter(Duration::from_secs(secs))
    }

    /// Controller action for this outcome.
    #[must_use]
    pub fn into_action(self, sync_period: Duration) -> Action {
        match self {
            Self::Done => Action::requeue(sync_period),
            Self::RequeueAfter(delay) => Action::requeue(delay),
        }
    }

    #[must_use]
    pub fn is_requeue(self) -> bool {
        matches!(self, Self::RequeueAfter(_))
    }
}

/// Check if a status value has actually changed compared to the current status.
///
/// Used to emit events only on transitions: writing the same status again is
/// a no-op for the patch helper, but an event would be published every time.
#[must_use]
pub fn status_changed<T: PartialEq>(current_value: &Option<T>, new_value: &Option<T>) -> bool {
    current_value != new_value
}
