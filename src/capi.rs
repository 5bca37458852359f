// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster API core types consumed by the provider.
//!
//! Only the fields the reconcilers read (and `MachinePool.spec.replicas`,
//! which the node-pool reconciler writes back) are modelled. Unknown fields
//! are ignored on deserialization and never written, because every write to
//! these objects is a merge patch of the touched field only.

use crate::constants::{CAPI_GROUP, KIND_CLUSTER, KIND_MACHINE, KIND_MACHINE_POOL};
use crate::crd::APIEndpoint;
use crate::labels::{CONTROL_PLANE_LABEL, PAUSED_ANNOTATION};
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Api, Client, CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of a Cluster API `Cluster`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub paused: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<APIEndpoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_ref: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<ObjectReference>,
}

/// Observed state of a Cluster API `Cluster`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub infrastructure_ready: bool,

    #[serde(default)]
    pub control_plane_ready: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Bootstrap configuration of a `Machine`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    /// Secret holding the bootstrap data under the `value` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}

/// Desired state of a Cluster API `Machine`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Machine",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    pub cluster_name: String,

    #[serde(default)]
    pub bootstrap: Bootstrap,

    #[serde(default)]
    pub infrastructure_ref: ObjectReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Desired state of a Cluster API `MachinePool`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "MachinePool",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachinePoolSpec {
    pub cluster_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

impl Cluster {
    /// Infrastructure is provisioned and machines may proceed.
    #[must_use]
    pub fn infrastructure_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| status.infrastructure_ready)
    }
}

impl Machine {
    /// Whether the machine carries the control plane label.
    #[must_use]
    pub fn is_control_plane(&self) -> bool {
        self.labels().contains_key(CONTROL_PLANE_LABEL)
    }
}

/// Whether reconciliation is paused by the cluster or the object itself.
#[must_use]
pub fn is_paused(cluster: &Cluster, meta: &ObjectMeta) -> bool {
    cluster.spec.paused
        || has_paused_annotation(&cluster.metadata)
        || has_paused_annotation(meta)
}

fn has_paused_annotation(meta: &ObjectMeta) -> bool {
    meta.annotations
        .as_ref()
        .is_some_and(|annotations| annotations.contains_key(PAUSED_ANNOTATION))
}

/// Owner reference of the given Cluster API kind, if any.
#[must_use]
pub fn find_owner<'a>(meta: &'a ObjectMeta, kind: &str) -> Option<&'a OwnerReference> {
    meta.owner_references.as_ref()?.iter().find(|owner| {
        owner.kind == kind
            && owner
                .api_version
                .split('/')
                .next()
                .is_some_and(|group| group == CAPI_GROUP)
    })
}

/// Fetch the `Cluster` owning an object, `None` while the owner reference is unset.
///
/// # Errors
///
/// Returns an error if the Kubernetes API call fails.
pub async fn get_owner_cluster(
    client: &Client,
    meta: &ObjectMeta,
) -> Result<Option<Cluster>, kube::Error> {
    let Some(owner) = find_owner(meta, KIND_CLUSTER) else {
        return Ok(None);
    };
    let namespace = meta.namespace.clone().unwrap_or_default();
    Api::<Cluster>::namespaced(client.clone(), &namespace)
        .get_opt(&owner.name)
        .await
}

/// Fetch the `Machine` owning an object, `None` while the owner reference is unset.
///
/// # Errors
///
/// Returns an error if the Kubernetes API call fails.
pub async fn get_owner_machine(
    client: &Client,
    meta: &ObjectMeta,
) -> Result<Option<Machine>, kube::Error> {
    let Some(owner) = find_owner(meta, KIND_MACHINE) else {
        return Ok(None);
    };
    let namespace = meta.namespace.clone().unwrap_or_default();
    Api::<Machine>::namespaced(client.clone(), &namespace)
        .get_opt(&owner.name)
        .await
}

/// Fetch the `MachinePool` owning an object, `None` while the owner reference is unset.
///
/// # Errors
///
/// Returns an error if the Kubernetes API call fails.
pub async fn get_owner_machine_pool(
    client: &Client,
    meta: &ObjectMeta,
) -> Result<Option<MachinePool>, kube::Error> {
    let Some(owner) = find_owner(meta, KIND_MACHINE_POOL) else {
        return Ok(None);
    };
    let namespace = meta.namespace.clone().unwrap_or_default();
    Api::<MachinePool>::namespaced(client.clone(), &namespace)
        .get_opt(&owner.name)
        .await
}

/// Fetch a `Cluster` by name in the given namespace.
///
/// # Errors
///
/// Returns an error if the Kubernetes API call fails.
pub async fn get_cluster(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<Option<Cluster>, kube::Error> {
    Api::<Cluster>::namespaced(client.clone(), namespace)
        .get_opt(name)
        .await
}

#[cfg(test)]
#[path = "capi_tests.rs"]
mod capi_tests;
