// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for the DigitalOcean infrastructure provider.
//!
//! This module defines the storage version (`v1beta1`) of every kind the
//! provider serves. Older versions live in [`crate::conversion`] and convert
//! through these types.
//!
//! # Resource Types
//!
//! ## Self-managed clusters
//!
//! - [`DOCluster`] - API server load balancer, control plane endpoint and DNS record
//! - [`DOMachine`] - A droplet with optional data-disk volumes
//! - [`DOMachineTemplate`] / [`DOClusterTemplate`] - Immutable templates of the above
//!
//! ## Managed clusters (DOKS)
//!
//! - [`DOKSCluster`] - A DigitalOcean managed Kubernetes cluster
//! - [`DOKSControlPlane`] - The managed control plane and its kubeconfig secret
//! - [`DOKSNodePool`] - A managed node pool backing a `MachinePool`
//!
//! # Example: Declaring a cluster
//!
//! ```rust,no_run
//! use capdo::crd::{DOClusterSpec, DONetwork};
//!
//! let spec = DOClusterSpec {
//!     region: "nyc1".to_string(),
//!     network: DONetwork::default(),
//!     control_plane_endpoint: Default::default(),
//!     control_plane_dns: None,
//! };
//! ```

use crate::constants::{
    DEFAULT_LB_HEALTHY_THRESHOLD, DEFAULT_LB_HEALTH_CHECK_INTERVAL_SECS,
    DEFAULT_LB_HEALTH_CHECK_TIMEOUT_SECS, DEFAULT_LB_PORT, DEFAULT_LB_UNHEALTHY_THRESHOLD,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Shared types
// ============================================================================

/// Endpoint used to communicate with the control plane.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct APIEndpoint {
    /// Hostname or IP address of the endpoint.
    #[serde(default)]
    pub host: String,

    /// Port of the endpoint.
    #[serde(default)]
    pub port: i32,
}

impl APIEndpoint {
    /// An endpoint is valid once both host and port are known.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }
}

/// Reference to a cloud resource and its last observed status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOResourceReference {
    /// Identifier of the resource at DigitalOcean.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Status of the resource as last reported by DigitalOcean.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_status: Option<String>,
}

/// Lifecycle state of a droplet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DOResourceStatus {
    New,
    Active,
    Errored,
    Off,
    Archive,
}

impl DOResourceStatus {
    /// Map a droplet status string reported by the API.
    #[must_use]
    pub fn from_droplet_status(status: &str) -> Option<Self> {
        match status {
            "new" => Some(Self::New),
            "active" => Some(Self::Active),
            "errored" => Some(Self::Errored),
            "off" => Some(Self::Off),
            "archive" => Some(Self::Archive),
            _ => None,
        }
    }
}

// ============================================================================
// DOCluster
// ============================================================================

/// Algorithm used by the API server load balancer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerAlgorithm {
    #[default]
    RoundRobin,
    LeastConnections,
}

impl LoadBalancerAlgorithm {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::LeastConnections => "least_connections",
        }
    }
}

/// TCP health check of the API server load balancer.
///
/// Zero values are replaced by defaults before use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOLoadBalancerHealthCheck {
    /// Seconds between two checks (3-300).
    #[serde(default)]
    #[schemars(range(min = 0, max = 300))]
    pub interval: i32,

    /// Seconds before a check times out (3-300).
    #[serde(default)]
    #[schemars(range(min = 0, max = 300))]
    pub timeout: i32,

    /// Failed checks before a target is removed (2-10).
    #[serde(default)]
    #[schemars(range(min = 0, max = 10))]
    pub unhealthy_threshold: i32,

    /// Passed checks before a target is added back (2-10).
    #[serde(default)]
    #[schemars(range(min = 0, max = 10))]
    pub healthy_threshold: i32,
}

/// API server load balancer settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOLoadBalancer {
    /// ID of a pre-existing load balancer to adopt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// API server port, forwarded as-is to the control plane (1-65535).
    #[serde(default)]
    #[schemars(range(min = 0, max = 65535))]
    pub port: i32,

    #[serde(default)]
    pub algorithm: LoadBalancerAlgorithm,

    #[serde(default)]
    pub health_check: DOLoadBalancerHealthCheck,
}

impl DOLoadBalancer {
    /// Fill in zero-valued fields with the provider defaults.
    pub fn apply_defaults(&mut self) {
        if self.port == 0 {
            self.port = DEFAULT_LB_PORT;
        }
        let hc = &mut self.health_check;
        if hc.interval == 0 {
            hc.interval = DEFAULT_LB_HEALTH_CHECK_INTERVAL_SECS;
        }
        if hc.timeout == 0 {
            hc.timeout = DEFAULT_LB_HEALTH_CHECK_TIMEOUT_SECS;
        }
        if hc.unhealthy_threshold == 0 {
            hc.unhealthy_threshold = DEFAULT_LB_UNHEALTHY_THRESHOLD;
        }
        if hc.healthy_threshold == 0 {
            hc.healthy_threshold = DEFAULT_LB_HEALTHY_THRESHOLD;
        }
    }
}

/// VPC the cluster resources are placed in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DOVPC {
    /// UUID of the VPC; empty selects the region default.
    #[serde(default, rename = "vpcUUID", skip_serializing_if = "String::is_empty")]
    pub vpc_uuid: String,
}

/// Network configuration of a `DOCluster`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DONetwork {
    #[serde(default)]
    pub load_balancer: DOLoadBalancer,

    #[serde(default)]
    pub vpc: DOVPC,
}

/// DNS record published for the control plane endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DOControlPlaneDNS {
    /// Domain managed by DigitalOcean DNS, e.g. `example.com`.
    pub domain: String,

    /// Record name inside the domain, e.g. `api`.
    #[serde(alias = "subdomain")]
    pub name: String,
}

impl DOControlPlaneDNS {
    /// `{name}.{domain}`
    #[must_use]
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.name, self.domain)
    }
}

/// `DOCluster` describes the DigitalOcean infrastructure shared by a cluster's machines.
///
/// # Example
///
/// ```yaml
/// apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
/// kind: DOCluster
/// metadata:
///   name: capdo-test
/// spec:
///   region: nyc1
///   network:
///     loadBalancer:
///       port: 6443
///       algorithm: round_robin
///   controlPlaneDNS:
///     domain: example.com
///     name: api
/// ```
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DOCluster",
    namespaced,
    category = "cluster-api",
    doc = "DOCluster is the DigitalOcean infrastructure of a Cluster API cluster: the API server load balancer, its endpoint and an optional DNS record.",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".spec.controlPlaneEndpoint.host"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "DOClusterStatus", derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct DOClusterSpec {
    /// DigitalOcean region slug, e.g. `nyc1`. Immutable.
    pub region: String,

    #[serde(default)]
    pub network: DONetwork,

    /// Populated by the provider once the load balancer is reachable.
    #[serde(default)]
    pub control_plane_endpoint: APIEndpoint,

    #[serde(
        default,
        rename = "controlPlaneDNS",
        skip_serializing_if = "Option::is_none"
    )]
    pub control_plane_dns: Option<DOControlPlaneDNS>,
}

/// Observed network state of a `DOCluster`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DONetworkResource {
    #[serde(default)]
    pub load_balancer_ref: DOResourceReference,
}

/// Status of a `DOCluster`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOClusterStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default, rename = "controlPlaneDNSRecordReady")]
    pub control_plane_dns_record_ready: bool,

    #[serde(default)]
    pub network: DONetworkResource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

// ============================================================================
// DOMachine
// ============================================================================

/// A block volume attached to the droplet at creation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataDisk {
    /// Appended to the machine name to form the volume name.
    pub name_suffix: String,

    /// Size of the volume in GiB.
    #[serde(rename = "diskSizeGB")]
    #[schemars(range(min = 1))]
    pub disk_size_gb: i64,

    /// Filesystem to format the volume with (`ext4` or `xfs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem_label: Option<String>,
}

/// `DOMachine` describes a single droplet backing a Cluster API `Machine`.
///
/// Apart from `providerID` and `additionalTags` the spec is immutable.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DOMachine",
    namespaced,
    category = "cluster-api",
    doc = "DOMachine is a DigitalOcean droplet backing a Cluster API Machine.",
    printcolumn = r#"{"name":"ProviderID","type":"string","jsonPath":".spec.providerID"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.instanceStatus"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[kube(status = "DOMachineStatus", derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct DOMachineSpec {
    /// `digitalocean://{dropletID}`, set by the provider after creation.
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Droplet size slug, e.g. `s-2vcpu-2gb`.
    pub size: String,

    /// Image ID or slug.
    pub image: IntOrString,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<DataDisk>,

    /// SSH key IDs or MD5 fingerprints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<IntOrString>,

    /// Public key uploaded to the account and added to the droplet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,

    /// Extra tags applied to the droplet on top of the ownership tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_tags: Vec<String>,
}

/// Kind of a machine address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MachineAddressType {
    Hostname,
    #[serde(rename = "ExternalIP")]
    ExternalIp,
    #[serde(rename = "InternalIP")]
    InternalIp,
    #[serde(rename = "ExternalDNS")]
    ExternalDns,
    #[serde(rename = "InternalDNS")]
    InternalDns,
}

/// Address reported for a machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MachineAddress {
    #[serde(rename = "type")]
    pub address_type: MachineAddressType,
    pub address: String,
}

/// Volume attached to the droplet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DOVolume {
    pub id: String,
}

/// Status of a `DOMachine`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOMachineStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MachineAddress>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<DOVolume>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_status: Option<DOResourceStatus>,

    /// Terminal error reason, e.g. `CreateMachineError`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

// ============================================================================
// Templates
// ============================================================================

/// Machine template body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DOMachineTemplateResource {
    pub spec: DOMachineSpec,
}

/// `DOMachineTemplate` is the immutable template machine deployments stamp out.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DOMachineTemplate",
    namespaced,
    category = "cluster-api",
    doc = "DOMachineTemplate is an immutable template of DOMachine specs."
)]
pub struct DOMachineTemplateSpec {
    pub template: DOMachineTemplateResource,
}

/// Cluster template body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DOClusterTemplateResource {
    pub spec: DOClusterSpec,
}

/// `DOClusterTemplate` is the immutable template used by ClusterClass.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DOClusterTemplate",
    namespaced,
    category = "cluster-api",
    doc = "DOClusterTemplate is an immutable template of DOCluster specs."
)]
pub struct DOClusterTemplateSpec {
    pub template: DOClusterTemplateResource,
}

// ============================================================================
// DOKS (managed Kubernetes)
// ============================================================================

/// Initial node pool a managed cluster is created with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DOKSDefaultNodePool {
    pub name: String,
    pub size: String,
    #[schemars(range(min = 1))]
    pub count: i32,
}

/// `DOKSCluster` is a DigitalOcean managed Kubernetes cluster.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DOKSCluster",
    namespaced,
    category = "cluster-api",
    doc = "DOKSCluster is a DigitalOcean managed Kubernetes cluster.",
    printcolumn = r#"{"name":"ClusterID","type":"string","jsonPath":".status.clusterID"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[kube(status = "DOKSClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct DOKSClusterSpec {
    pub region: String,

    /// DOKS version slug, e.g. `1.31.1-do.0`.
    pub version: String,

    #[serde(default, rename = "vpcUUID", skip_serializing_if = "Option::is_none")]
    pub vpc_uuid: Option<String>,

    /// `digitalocean://{clusterID}`, set by the provider.
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    #[serde(default)]
    pub control_plane_endpoint: APIEndpoint,

    pub default_node_pool: DOKSDefaultNodePool,
}

/// Status of a `DOKSCluster`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOKSClusterStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default, rename = "clusterID", skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

/// `DOKSControlPlane` exposes a managed control plane to Cluster API.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "controlplane.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DOKSControlPlane",
    namespaced,
    category = "cluster-api",
    doc = "DOKSControlPlane is the managed control plane of a DOKS cluster.",
    printcolumn = r#"{"name":"Initialized","type":"boolean","jsonPath":".status.initialized"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[kube(status = "DOKSControlPlaneStatus")]
pub struct DOKSControlPlaneSpec {
    pub version: String,
}

/// Status of a `DOKSControlPlane`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOKSControlPlaneStatus {
    /// Set once the kubeconfig secret has been written.
    #[serde(default)]
    pub initialized: bool,

    #[serde(default)]
    pub ready: bool,

    /// Always true: the control plane is not made of Machines.
    #[serde(default)]
    pub external_managed_control_plane: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

/// `DOKSNodePool` is a managed node pool backing a Cluster API `MachinePool`.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "DOKSNodePool",
    namespaced,
    category = "cluster-api",
    doc = "DOKSNodePool is a node pool of a DOKS cluster.",
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".status.replicas"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[kube(status = "DOKSNodePoolStatus")]
#[serde(rename_all = "camelCase")]
pub struct DOKSNodePoolSpec {
    /// Droplet size slug of the pool nodes.
    pub size: String,

    /// Let DigitalOcean scale the pool between `minNodes` and `maxNodes`.
    #[serde(default)]
    pub auto_scale: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_nodes: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<i32>,

    /// `digitalocean://{dropletID}` of each node, set by the provider.
    #[serde(default, rename = "providerIDList", skip_serializing_if = "Vec::is_empty")]
    pub provider_id_list: Vec<String>,
}

/// Status of a `DOKSNodePool`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOKSNodePoolStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub replicas: i32,

    #[serde(default, rename = "nodePoolID", skip_serializing_if = "Option::is_none")]
    pub node_pool_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
