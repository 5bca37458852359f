// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scope of a `DOCluster` reconcile.

use crate::capi::Cluster;
use crate::cloud::CloudServices;
use crate::crd::{APIEndpoint, DOCluster, DOClusterStatus, DOLoadBalancer, DOResourceReference};
use crate::dns::PropagationChecker;
use crate::events::PendingEvent;
use crate::naming::{cluster_uid_role_tag, load_balancer_name, ResourceRole};
use kube::ResourceExt;
use std::sync::Arc;

pub struct ClusterScope {
    pub cluster: Cluster,
    pub do_cluster: DOCluster,
    pub cloud: CloudServices,
    /// Set when control plane DNS records can be verified.
    pub dns: Option<Arc<PropagationChecker>>,
    pub events: Vec<PendingEvent>,
}

impl ClusterScope {
    #[must_use]
    pub fn new(cluster: Cluster, do_cluster: DOCluster, cloud: CloudServices) -> Self {
        Self {
            cluster,
            do_cluster,
            cloud,
            dns: None,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_dns(mut self, checker: Arc<PropagationChecker>) -> Self {
        self.dns = Some(checker);
        self
    }

    /// Name of the owning Cluster API `Cluster`.
    #[must_use]
    pub fn name(&self) -> String {
        self.cluster.name_any()
    }

    /// UID of the owning Cluster API `Cluster`.
    #[must_use]
    pub fn uid(&self) -> String {
        self.cluster.uid().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> String {
        self.do_cluster.namespace().unwrap_or_default()
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.do_cluster.spec.region
    }

    #[must_use]
    pub fn vpc_uuid(&self) -> &str {
        &self.do_cluster.spec.network.vpc.vpc_uuid
    }

    #[must_use]
    pub fn load_balancer_spec(&self) -> &DOLoadBalancer {
        &self.do_cluster.spec.network.load_balancer
    }

    /// `{safe(cluster)}-apiserver-{uid}`
    #[must_use]
    pub fn load_balancer_name(&self) -> String {
        load_balancer_name(&self.name(), &self.uid())
    }

    /// Tag identifying the API server load balancer of this cluster incarnation.
    #[must_use]
    pub fn load_balancer_tag(&self) -> String {
        cluster_uid_role_tag(&self.name(), &self.uid(), ResourceRole::ApiServer)
    }

    pub fn apply_defaults(&mut self) {
        self.do_cluster.spec.network.load_balancer.apply_defaults();
    }

    pub fn status_mut(&mut self) -> &mut DOClusterStatus {
        self.do_cluster.status.get_or_insert_with(Default::default)
    }

    #[must_use]
    pub fn load_balancer_ref(&self) -> Option<&DOResourceReference> {
        self.do_cluster
            .status
            .as_ref()
            .map(|status| &status.network.load_balancer_ref)
    }

    /// Load balancer ID recorded in status, if any.
    #[must_use]
    pub fn load_balancer_id(&self) -> Option<String> {
        self.load_balancer_ref()
            .and_then(|r| r.resource_id.clone())
            .filter(|id| !id.is_empty())
    }

    pub fn set_load_balancer_ref(&mut self, id: &str, status: &str) {
        self.status_mut().network.load_balancer_ref = DOResourceReference {
            resource_id: Some(id.to_string()),
            resource_status: Some(status.to_string()),
        };
    }

    pub fn set_control_plane_endpoint(&mut self, host: String, port: i32) {
        self.do_cluster.spec.control_plane_endpoint = APIEndpoint { host, port };
    }

    pub fn set_dns_record_ready(&mut self, ready: bool) {
        self.status_mut().control_plane_dns_record_ready = ready;
    }

    pub fn set_ready(&mut self) {
        self.status_mut().ready = true;
    }

    /// Queue an event, published after the object has been patched.
    pub fn record(&mut self, event: PendingEvent) {
        self.events.push(event);
    }
}
