// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Managed Kubernetes (DOKS) reconciliation.
//!
//! Three kinds cooperate to present a DigitalOcean managed cluster to
//! Cluster API:
//!
//! - [`cluster`] - `DOKSCluster`, the managed cluster itself
//! - [`control_plane`] - `DOKSControlPlane`, which publishes the kubeconfig
//! - [`node_pool`] - `DOKSNodePool`, one node pool per `MachinePool`
//!
//! These controllers only run when DOKS support is enabled.

pub mod cluster;
pub mod control_plane;
pub mod node_pool;

pub use cluster::reconcile_doks_cluster;
pub use control_plane::reconcile_doks_control_plane;
pub use node_pool::reconcile_doks_node_pool;

use crate::capi::Cluster;
use crate::crd::DOKSCluster;
use kube::{Api, Client};

/// `DOKSCluster` referenced as the infrastructure of `cluster`.
///
/// # Errors
///
/// Returns an error if the Kubernetes API call fails.
pub async fn get_doks_cluster(
    client: &Client,
    namespace: &str,
    cluster: &Cluster,
) -> Result<Option<DOKSCluster>, kube::Error> {
    let Some(name) = cluster
        .spec
        .infrastructure_ref
        .as_ref()
        .and_then(|r| r.name.clone())
    else {
        return Ok(None);
    };
    Api::<DOKSCluster>::namespaced(client.clone(), namespace)
        .get_opt(&name)
        .await
}
