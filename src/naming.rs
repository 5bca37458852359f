// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deterministic names and tags for DigitalOcean resources.
//!
//! Cloud objects carry no owner references, so ownership is re-established
//! after a restart from a structured tag set:
//!
//! ```text
//! sigs-k8s-io:capdo:{cluster}
//! sigs-k8s-io:capdo:{cluster}:{role}
//! sigs-k8s-io:capdo:{cluster}:{cluster-uid}:{role}
//! name:{name}
//! {additional...}
//! ```
//!
//! The uid-qualified tag is unique per cluster incarnation and is the one every
//! list-by-tag lookup filters on.

use std::fmt;
use thiserror::Error;

/// Prefix shared by every ownership tag.
pub const TAG_PREFIX: &str = "sigs-k8s-io:capdo";

/// Prefix of the per-object name tag.
pub const NAME_TAG_PREFIX: &str = "name:";

/// Scheme of droplet and managed-cluster provider IDs.
pub const PROVIDER_ID_PREFIX: &str = "digitalocean://";

/// Role a cloud resource plays inside a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceRole {
    /// Control plane machines and the API server load balancer
    ApiServer,
    /// Worker machines
    Node,
}

impl ResourceRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiServer => "apiserver",
            Self::Node => "node",
        }
    }
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace characters DigitalOcean rejects in names and tags.
///
/// `.` and `/` become `-`. The function is idempotent.
#[must_use]
pub fn do_safe_name(name: &str) -> String {
    name.replace(['.', '/'], "-")
}

/// `sigs-k8s-io:capdo:{cluster}`
#[must_use]
pub fn cluster_name_tag(cluster_name: &str) -> String {
    format!("{TAG_PREFIX}:{}", do_safe_name(cluster_name))
}

/// `sigs-k8s-io:capdo:{cluster}:{role}`
#[must_use]
pub fn cluster_name_role_tag(cluster_name: &str, role: ResourceRole) -> String {
    format!("{TAG_PREFIX}:{}:{role}", do_safe_name(cluster_name))
}

/// `sigs-k8s-io:capdo:{cluster}:{uid}:{role}`, the ownership index.
#[must_use]
pub fn cluster_uid_role_tag(cluster_name: &str, cluster_uid: &str, role: ResourceRole) -> String {
    format!(
        "{TAG_PREFIX}:{}:{cluster_uid}:{role}",
        do_safe_name(cluster_name)
    )
}

/// `name:{safe(name)}`
#[must_use]
pub fn name_tag(name: &str) -> String {
    format!("{NAME_TAG_PREFIX}{}", do_safe_name(name))
}

/// Inputs of [`build_tags`].
#[derive(Clone, Debug)]
pub struct TagParams<'a> {
    pub cluster_name: &'a str,
    pub cluster_uid: &'a str,
    pub role: ResourceRole,
    pub name: &'a str,
    pub additional: &'a [String],
}

/// Build the ordered tag set for a cloud resource.
///
/// Pure function of its inputs: the same params always produce the same list.
#[must_use]
pub fn build_tags(params: &TagParams<'_>) -> Vec<String> {
    let mut tags = Vec::with_capacity(4 + params.additional.len());
    tags.push(cluster_name_tag(params.cluster_name));
    tags.push(cluster_name_role_tag(params.cluster_name, params.role));
    tags.push(cluster_uid_role_tag(
        params.cluster_name,
        params.cluster_uid,
        params.role,
    ));
    tags.push(name_tag(params.name));
    tags.extend(params.additional.iter().cloned());
    tags
}

/// Name of the API server load balancer: `{safe(cluster)}-apiserver-{uid}`.
#[must_use]
pub fn load_balancer_name(cluster_name: &str, cluster_uid: &str) -> String {
    format!(
        "{}-{}-{cluster_uid}",
        do_safe_name(cluster_name),
        ResourceRole::ApiServer
    )
}

/// Name of a data-disk volume: `safe({machine}-{suffix})`.
#[must_use]
pub fn data_disk_volume_name(machine_name: &str, name_suffix: &str) -> String {
    do_safe_name(&format!("{machine_name}-{name_suffix}"))
}

/// Errors raised while parsing a provider ID.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderIdError {
    #[error("provider ID {0:?} does not start with digitalocean://")]
    MissingScheme(String),

    #[error("provider ID {0:?} has an empty identifier")]
    EmptyId(String),

    #[error("provider ID {0:?} does not carry a numeric droplet ID")]
    NotNumeric(String),
}

/// `digitalocean://{id}` for any droplet, cluster or node identifier.
#[must_use]
pub fn provider_id(id: impl fmt::Display) -> String {
    format!("{PROVIDER_ID_PREFIX}{id}")
}

/// Identifier part of a provider ID. Accepts numeric IDs and UUIDs.
///
/// # Errors
///
/// Returns an error when the scheme is missing or the identifier is empty.
pub fn parse_provider_id(value: &str) -> Result<&str, ProviderIdError> {
    let id = value
        .strip_prefix(PROVIDER_ID_PREFIX)
        .ok_or_else(|| ProviderIdError::MissingScheme(value.to_string()))?;
    if id.is_empty() {
        return Err(ProviderIdError::EmptyId(value.to_string()));
    }
    Ok(id)
}

/// Numeric droplet ID of a `digitalocean://{id}` provider ID.
///
/// # Errors
///
/// Returns an error unless the value matches `^digitalocean://\d+$`.
pub fn parse_droplet_id(value: &str) -> Result<u64, ProviderIdError> {
    let id = parse_provider_id(value)?;
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProviderIdError::NotNumeric(value.to_string()));
    }
    id.parse()
        .map_err(|_| ProviderIdError::NotNumeric(value.to_string()))
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;
