// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scope of a `DOMachine` reconcile.

use crate::capi::{Cluster, Machine};
use crate::cloud::CloudServices;
use crate::crd::{
    DOCluster, DOMachine, DOMachineStatus, DOResourceStatus, DOVolume, MachineAddress,
};
use crate::errors::ReconcileError;
use crate::events::PendingEvent;
use crate::naming::{self, build_tags, cluster_uid_role_tag, ResourceRole, TagParams};
use kube::ResourceExt;

pub struct MachineScope {
    pub cluster: Cluster,
    pub machine: Machine,
    pub do_cluster: DOCluster,
    pub do_machine: DOMachine,
    /// Contents of the bootstrap data secret, `None` until it exists.
    pub bootstrap_data: Option<String>,
    pub cloud: CloudServices,
    pub events: Vec<PendingEvent>,
}

impl MachineScope {
    #[must_use]
    pub fn new(
        cluster: Cluster,
        machine: Machine,
        do_cluster: DOCluster,
        do_machine: DOMachine,
        cloud: CloudServices,
    ) -> Self {
        Self {
            cluster,
            machine,
            do_cluster,
            do_machine,
            bootstrap_data: None,
            cloud,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_bootstrap_data(mut self, data: Option<String>) -> Self {
        self.bootstrap_data = data;
        self
    }

    /// Name of the `DOMachine`.
    #[must_use]
    pub fn name(&self) -> String {
        self.do_machine.name_any()
    }

    /// Machine name as DigitalOcean accepts it, used for the droplet and
    /// uploaded SSH key.
    #[must_use]
    pub fn droplet_name(&self) -> String {
        naming::do_safe_name(&self.name())
    }

    #[must_use]
    pub fn namespace(&self) -> String {
        self.do_machine.namespace().unwrap_or_default()
    }

    #[must_use]
    pub fn cluster_name(&self) -> String {
        self.cluster.name_any()
    }

    #[must_use]
    pub fn cluster_uid(&self) -> String {
        self.cluster.uid().unwrap_or_default()
    }

    #[must_use]
    pub fn role(&self) -> ResourceRole {
        if self.machine.is_control_plane() {
            ResourceRole::ApiServer
        } else {
            ResourceRole::Node
        }
    }

    /// Region of the cluster the machine belongs to.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.do_cluster.spec.region
    }

    #[must_use]
    pub fn vpc_uuid(&self) -> &str {
        &self.do_cluster.spec.network.vpc.vpc_uuid
    }

    /// Full ordered tag set the droplet must carry.
    #[must_use]
    pub fn droplet_tags(&self) -> Vec<String> {
        build_tags(&TagParams {
            cluster_name: &self.cluster_name(),
            cluster_uid: &self.cluster_uid(),
            role: self.role(),
            name: &self.name(),
            additional: &self.do_machine.spec.additional_tags,
        })
    }

    /// Tag every droplet of this cluster incarnation and role carries.
    #[must_use]
    pub fn ownership_tag(&self) -> String {
        cluster_uid_role_tag(&self.cluster_name(), &self.cluster_uid(), self.role())
    }

    /// Droplet ID parsed from `spec.providerID`.
    ///
    /// # Errors
    ///
    /// A malformed provider ID is a terminal error: the spec is immutable, so
    /// retrying cannot fix it.
    pub fn droplet_id(&self) -> Result<Option<u64>, ReconcileError> {
        let Some(provider_id) = self
            .do_machine
            .spec
            .provider_id
            .as_deref()
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };
        naming::parse_droplet_id(provider_id)
            .map(Some)
            .map_err(|e| ReconcileError::Terminal {
                reason: "UpdateMachineError",
                message: e.to_string(),
            })
    }

    pub fn set_provider_id(&mut self, droplet_id: u64) {
        self.do_machine.spec.provider_id = Some(naming::provider_id(droplet_id));
    }

    pub fn status_mut(&mut self) -> &mut DOMachineStatus {
        self.do_machine.status.get_or_insert_with(Default::default)
    }

    /// Whether a terminal failure has been recorded.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.do_machine
            .status
            .as_ref()
            .is_some_and(|s| s.failure_reason.is_some() || s.failure_message.is_some())
    }

    pub fn set_failure(&mut self, reason: &str, message: impl Into<String>) {
        let status = self.status_mut();
        status.failure_reason = Some(reason.to_string());
        status.failure_message = Some(message.into());
    }

    pub fn set_instance_status(&mut self, instance_status: Option<DOResourceStatus>) {
        self.status_mut().instance_status = instance_status;
    }

    pub fn set_addresses(&mut self, addresses: Vec<MachineAddress>) {
        self.status_mut().addresses = addresses;
    }

    pub fn set_volumes(&mut self, volume_ids: Vec<String>) {
        self.status_mut().volumes = volume_ids.into_iter().map(|id| DOVolume { id }).collect();
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.status_mut().ready = ready;
    }

    /// Queue an event, published after the object has been patched.
    pub fn record(&mut self, event: PendingEvent) {
        self.events.push(event);
    }
}
