// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scopes of the managed Kubernetes (DOKS) reconciles.

use crate::capi::{Cluster, MachinePool};
use crate::cloud::CloudServices;
use crate::crd::{
    DOKSCluster, DOKSClusterStatus, DOKSControlPlane, DOKSControlPlaneStatus, DOKSNodePool,
    DOKSNodePoolStatus,
};
use crate::events::PendingEvent;
use crate::naming::{cluster_uid_role_tag, do_safe_name, ResourceRole};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;

/// Cluster ID recorded on a `DOKSCluster`, if any.
#[must_use]
pub fn managed_cluster_id(doks_cluster: &DOKSCluster) -> Option<String> {
    doks_cluster
        .status
        .as_ref()
        .and_then(|status| status.cluster_id.clone())
        .filter(|id| !id.is_empty())
}

/// Scope of a `DOKSCluster` reconcile.
pub struct ManagedClusterScope {
    pub cluster: Cluster,
    pub doks_cluster: DOKSCluster,
    pub cloud: CloudServices,
    pub events: Vec<PendingEvent>,
}

impl ManagedClusterScope {
    #[must_use]
    pub fn new(cluster: Cluster, doks_cluster: DOKSCluster, cloud: CloudServices) -> Self {
        Self {
            cluster,
            doks_cluster,
            cloud,
            events: Vec::new(),
        }
    }

    /// DO-safe name of the managed cluster.
    #[must_use]
    pub fn name(&self) -> String {
        do_safe_name(&self.cluster.name_any())
    }

    #[must_use]
    pub fn namespace(&self) -> String {
        self.doks_cluster.namespace().unwrap_or_default()
    }

    /// Tag identifying the managed cluster of this cluster incarnation.
    #[must_use]
    pub fn ownership_tag(&self) -> String {
        cluster_uid_role_tag(
            &self.cluster.name_any(),
            &self.cluster.uid().unwrap_or_default(),
            ResourceRole::ApiServer,
        )
    }

    #[must_use]
    pub fn cluster_id(&self) -> Option<String> {
        managed_cluster_id(&self.doks_cluster)
    }

    pub fn status_mut(&mut self) -> &mut DOKSClusterStatus {
        self.doks_cluster.status.get_or_insert_with(Default::default)
    }

    pub fn record(&mut self, event: PendingEvent) {
        self.events.push(event);
    }
}

/// Scope of a `DOKSControlPlane` reconcile.
pub struct ControlPlaneScope {
    pub cluster: Cluster,
    pub control_plane: DOKSControlPlane,
    /// The infrastructure `DOKSCluster`, `None` until it exists.
    pub doks_cluster: Option<DOKSCluster>,
    /// The kubeconfig secret; the reconcile replaces it when it changes.
    pub kubeconfig_secret: Option<Secret>,
    pub cloud: CloudServices,
    pub events: Vec<PendingEvent>,
}

impl ControlPlaneScope {
    #[must_use]
    pub fn new(
        cluster: Cluster,
        control_plane: DOKSControlPlane,
        doks_cluster: Option<DOKSCluster>,
        cloud: CloudServices,
    ) -> Self {
        Self {
            cluster,
            control_plane,
            doks_cluster,
            kubeconfig_secret: None,
            cloud,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_kubeconfig_secret(mut self, secret: Option<Secret>) -> Self {
        self.kubeconfig_secret = secret;
        self
    }

    /// Name of the kubeconfig secret; equals the `Cluster` name.
    #[must_use]
    pub fn kubeconfig_secret_name(&self) -> String {
        self.cluster.name_any()
    }

    #[must_use]
    pub fn namespace(&self) -> String {
        self.control_plane.namespace().unwrap_or_default()
    }

    #[must_use]
    pub fn cluster_id(&self) -> Option<String> {
        self.doks_cluster.as_ref().and_then(managed_cluster_id)
    }

    pub fn status_mut(&mut self) -> &mut DOKSControlPlaneStatus {
        self.control_plane
            .status
            .get_or_insert_with(Default::default)
    }

    pub fn record(&mut self, event: PendingEvent) {
        self.events.push(event);
    }
}

/// Scope of a `DOKSNodePool` reconcile.
pub struct NodePoolScope {
    pub cluster: Cluster,
    pub machine_pool: MachinePool,
    pub node_pool: DOKSNodePool,
    /// The infrastructure `DOKSCluster`, `None` once it is gone.
    pub doks_cluster: Option<DOKSCluster>,
    pub cloud: CloudServices,
    pub events: Vec<PendingEvent>,
}

impl NodePoolScope {
    #[must_use]
    pub fn new(
        cluster: Cluster,
        machine_pool: MachinePool,
        node_pool: DOKSNodePool,
        doks_cluster: Option<DOKSCluster>,
        cloud: CloudServices,
    ) -> Self {
        Self {
            cluster,
            machine_pool,
            node_pool,
            doks_cluster,
            cloud,
            events: Vec::new(),
        }
    }

    /// DO-safe name of the node pool, derived from the `MachinePool`.
    #[must_use]
    pub fn name(&self) -> String {
        do_safe_name(&self.machine_pool.name_any())
    }

    #[must_use]
    pub fn namespace(&self) -> String {
        self.node_pool.namespace().unwrap_or_default()
    }

    #[must_use]
    pub fn cluster_id(&self) -> Option<String> {
        self.doks_cluster.as_ref().and_then(managed_cluster_id)
    }

    #[must_use]
    pub fn node_pool_id(&self) -> Option<String> {
        self.node_pool
            .status
            .as_ref()
            .and_then(|status| status.node_pool_id.clone())
            .filter(|id| !id.is_empty())
    }

    /// Whether the managed cluster is being deleted or already gone.
    #[must_use]
    pub fn managed_cluster_going_away(&self) -> bool {
        self.doks_cluster
            .as_ref()
            .is_none_or(|c| c.metadata.deletion_timestamp.is_some())
    }

    /// Replica count requested by the `MachinePool` (defaults to 1).
    #[must_use]
    pub fn desired_replicas(&self) -> i32 {
        self.machine_pool.spec.replicas.unwrap_or(1)
    }

    /// Tags applied to the node pool.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        vec![cluster_uid_role_tag(
            &self.cluster.name_any(),
            &self.cluster.uid().unwrap_or_default(),
            ResourceRole::Node,
        )]
    }

    pub fn status_mut(&mut self) -> &mut DOKSNodePoolStatus {
        self.node_pool.status.get_or_insert_with(Default::default)
    }

    pub fn record(&mut self, event: PendingEvent) {
        self.events.push(event);
    }
}
