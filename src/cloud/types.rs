// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DigitalOcean API objects and request bodies.
//!
//! Only the fields the provider reads or sends are modelled; the API returns
//! many more, which serde ignores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Region a resource lives in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub slug: String,
}

// ============================================================================
// Droplets
// ============================================================================

/// IPv4 address of a droplet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkV4 {
    pub ip_address: String,
    /// `public` or `private`
    #[serde(rename = "type")]
    pub network_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkV4>,
}

/// A DigitalOcean virtual machine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Droplet {
    pub id: u64,
    pub name: String,
    /// `new`, `active`, `off` or `archive`
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub networks: Networks,
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub size_slug: String,
    #[serde(default)]
    pub volume_ids: Vec<String>,
    #[serde(default)]
    pub vpc_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Droplet {
    fn ipv4(&self, network_type: &str) -> Option<&str> {
        self.networks
            .v4
            .iter()
            .find(|network| network.network_type == network_type)
            .map(|network| network.ip_address.as_str())
    }

    #[must_use]
    pub fn private_ipv4(&self) -> Option<&str> {
        self.ipv4("private")
    }

    #[must_use]
    pub fn public_ipv4(&self) -> Option<&str> {
        self.ipv4("public")
    }
}

/// Image of a droplet create request, sent as its ID or its slug.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropletCreateImage {
    Id(u64),
    Slug(String),
}

impl Serialize for DropletCreateImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Id(id) => serializer.serialize_u64(*id),
            Self::Slug(slug) => serializer.serialize_str(slug),
        }
    }
}

/// SSH key of a droplet create request.
///
/// Sent as the numeric ID when known, otherwise as the fingerprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropletCreateSshKey {
    pub id: u64,
    pub fingerprint: String,
}

impl Serialize for DropletCreateSshKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.id != 0 {
            serializer.serialize_u64(self.id)
        } else {
            serializer.serialize_str(&self.fingerprint)
        }
    }
}

/// Body of `POST /v2/droplets`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DropletCreateRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: DropletCreateImage,
    pub ssh_keys: Vec<DropletCreateSshKey>,
    pub private_networking: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_data: String,
    /// Volume IDs attached at creation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub vpc_uuid: String,
    pub tags: Vec<String>,
}

// ============================================================================
// Load balancers
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub entry_protocol: String,
    pub entry_port: i32,
    pub target_protocol: String,
    pub target_port: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub protocol: String,
    pub port: i32,
    pub check_interval_seconds: i32,
    pub response_timeout_seconds: i32,
    pub unhealthy_threshold: i32,
    pub healthy_threshold: i32,
}

/// A DigitalOcean load balancer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    /// Empty until the address is allocated.
    #[serde(default)]
    pub ip: String,
    /// `new`, `active` or `errored`
    pub status: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub forwarding_rules: Vec<ForwardingRule>,
    #[serde(default)]
    pub health_check: HealthCheck,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub vpc_uuid: String,
}

/// Body of `POST /v2/load_balancers` and `PUT /v2/load_balancers/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoadBalancerRequest {
    pub name: String,
    pub algorithm: String,
    pub region: String,
    pub forwarding_rules: Vec<ForwardingRule>,
    pub health_check: HealthCheck,
    pub tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub vpc_uuid: String,
}

// ============================================================================
// Images and keys
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub distribution: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub id: u64,
    pub fingerprint: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub name: String,
}

/// Body of `POST /v2/account/keys`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyCreateRequest {
    pub name: String,
    pub public_key: String,
}

// ============================================================================
// Volumes
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub size_gigabytes: i64,
    #[serde(default)]
    pub droplet_ids: Vec<u64>,
    #[serde(default)]
    pub filesystem_type: String,
    #[serde(default)]
    pub filesystem_label: String,
}

/// Body of `POST /v2/volumes`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeCreateRequest {
    pub region: String,
    pub name: String,
    pub size_gigabytes: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filesystem_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filesystem_label: String,
}

// ============================================================================
// Tags
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// A resource a tag is attached to or detached from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResource {
    pub resource_id: String,
    pub resource_type: String,
}

// ============================================================================
// Domains
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub data: String,
    #[serde(default)]
    pub ttl: u32,
}

/// Body of record create and edit calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DomainRecordEditRequest {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub data: String,
    pub ttl: u32,
}

// ============================================================================
// Managed Kubernetes
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesState {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: KubernetesState,
    #[serde(default)]
    pub droplet_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesNodePool {
    pub id: String,
    pub name: String,
    pub size: String,
    pub count: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub auto_scale: bool,
    #[serde(default)]
    pub min_nodes: i32,
    #[serde(default)]
    pub max_nodes: i32,
    #[serde(default)]
    pub nodes: Vec<KubernetesNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesCluster {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub vpc_uuid: String,
    /// `https://{id}.k8s.ondigitalocean.com`
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub node_pools: Vec<KubernetesNodePool>,
    #[serde(default)]
    pub status: KubernetesState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KubernetesNodePoolCreateRequest {
    pub name: String,
    pub size: String,
    pub count: i32,
    pub tags: Vec<String>,
    pub auto_scale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_nodes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KubernetesNodePoolUpdateRequest {
    pub name: String,
    pub count: i32,
    pub auto_scale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_nodes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KubernetesClusterCreateRequest {
    pub name: String,
    #[serde(rename = "region")]
    pub region_slug: String,
    #[serde(rename = "version")]
    pub version_slug: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub vpc_uuid: String,
    pub tags: Vec<String>,
    pub node_pools: Vec<KubernetesNodePoolCreateRequest>,
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Pages {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub pages: Option<Pages>,
}

impl Links {
    /// Whether the listing has another page.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.pages
            .as_ref()
            .and_then(|pages| pages.next.as_ref())
            .is_some_and(|next| !next.is_empty())
    }
}
