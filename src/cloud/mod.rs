// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DigitalOcean cloud API access.
//!
//! Reconcilers never talk to the HTTP client directly. They receive a
//! [`CloudServices`] bundle of capability traits, one per DigitalOcean API
//! area, so tests can substitute the in-memory fake from `fake.rs`.

pub mod client;
#[cfg(test)]
pub mod fake;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use types::{
    DomainRecord, DomainRecordEditRequest, Droplet, DropletCreateRequest, Image, Key,
    KeyCreateRequest, KubernetesCluster, KubernetesClusterCreateRequest, KubernetesNodePool,
    KubernetesNodePoolCreateRequest, KubernetesNodePoolUpdateRequest, LoadBalancer,
    LoadBalancerRequest, Tag, TagResource, Volume, VolumeCreateRequest,
};

pub use client::DoClient;

/// Errors returned by the DigitalOcean API layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// The API answered 404 for a single resource.
    #[error("{resource} '{id}' not found")]
    NotFound {
        /// Kind of resource, e.g. `droplet`
        resource: &'static str,
        /// ID or name that was looked up
        id: String,
    },

    /// The API rejected the call.
    #[error("DigitalOcean API returned HTTP {status} ({id}): {message}")]
    Api {
        status: u16,
        /// Error ID from the response body, e.g. `unprocessable_entity`
        id: String,
        message: String,
    },

    /// The API answered 429 and retries were exhausted.
    #[error("DigitalOcean API rate limit exceeded: {message}")]
    RateLimited { message: String },

    /// The request never got an HTTP answer.
    #[error("DigitalOcean API request failed: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("failed to decode DigitalOcean API response: {0}")]
    Decode(String),
}

impl CloudError {
    /// Whether the call failed because the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Api { status: 404, .. })
    }

    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound { .. } | Self::Decode(_) => false,
        }
    }

    /// Whether the API is throttling this client.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Api { status: 429, .. })
    }

    /// Whether the API rejected the request content (4xx other than 404/429).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status) && *status != 404 && *status != 429)
    }

    /// Short reason string for status fields and metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::Api { status, .. } => match *status {
                400 | 422 => "InvalidRequest",
                401 => "Unauthorized",
                403 => "Forbidden",
                404 => "NotFound",
                409 => "Conflict",
                429 => "RateLimited",
                _ if *status >= 500 => "ServerError",
                _ => "ClientError",
            },
            Self::RateLimited { .. } => "RateLimited",
            Self::Transport(_) => "TransportError",
            Self::Decode(_) => "DecodeError",
        }
    }
}

pub type CloudResult<T> = Result<T, CloudError>;

/// Droplet lifecycle.
#[async_trait]
pub trait DropletService: Send + Sync {
    async fn get(&self, id: u64) -> CloudResult<Droplet>;
    async fn list_by_tag(&self, tag: &str) -> CloudResult<Vec<Droplet>>;
    async fn create(&self, request: &DropletCreateRequest) -> CloudResult<Droplet>;
    async fn delete(&self, id: u64) -> CloudResult<()>;
}

/// Load balancer lifecycle.
#[async_trait]
pub trait LoadBalancerService: Send + Sync {
    async fn get(&self, id: &str) -> CloudResult<LoadBalancer>;
    async fn list(&self) -> CloudResult<Vec<LoadBalancer>>;
    async fn create(&self, request: &LoadBalancerRequest) -> CloudResult<LoadBalancer>;
    async fn update(&self, id: &str, request: &LoadBalancerRequest) -> CloudResult<LoadBalancer>;
    async fn delete(&self, id: &str) -> CloudResult<()>;
}

/// Image lookup.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn get_by_id(&self, id: u64) -> CloudResult<Image>;
    async fn get_by_slug(&self, slug: &str) -> CloudResult<Image>;
}

/// SSH keys registered on the account.
#[async_trait]
pub trait KeyService: Send + Sync {
    async fn get_by_id(&self, id: u64) -> CloudResult<Key>;
    async fn get_by_fingerprint(&self, fingerprint: &str) -> CloudResult<Key>;
    async fn list(&self) -> CloudResult<Vec<Key>>;
    async fn create(&self, request: &KeyCreateRequest) -> CloudResult<Key>;
    async fn delete_by_fingerprint(&self, fingerprint: &str) -> CloudResult<()>;
}

/// Block storage volumes.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn list_by_name(&self, name: &str, region: &str) -> CloudResult<Vec<Volume>>;
    async fn create(&self, request: &VolumeCreateRequest) -> CloudResult<Volume>;
    async fn delete(&self, id: &str) -> CloudResult<()>;
}

/// Tags and tag attachments.
#[async_trait]
pub trait TagService: Send + Sync {
    async fn get(&self, name: &str) -> CloudResult<Tag>;
    async fn create(&self, name: &str) -> CloudResult<Tag>;
    async fn tag_resources(&self, name: &str, resources: &[TagResource]) -> CloudResult<()>;
    async fn untag_resources(&self, name: &str, resources: &[TagResource]) -> CloudResult<()>;
}

/// DNS records of domains hosted on DigitalOcean.
#[async_trait]
pub trait DomainService: Send + Sync {
    /// A records whose fully qualified name equals `fqdn`.
    async fn a_records_by_name(&self, domain: &str, fqdn: &str) -> CloudResult<Vec<DomainRecord>>;
    async fn create_record(
        &self,
        domain: &str,
        request: &DomainRecordEditRequest,
    ) -> CloudResult<DomainRecord>;
    async fn edit_record(
        &self,
        domain: &str,
        id: u64,
        request: &DomainRecordEditRequest,
    ) -> CloudResult<DomainRecord>;
    async fn delete_record(&self, domain: &str, id: u64) -> CloudResult<()>;
}

/// Managed Kubernetes (DOKS) clusters and node pools.
#[async_trait]
pub trait KubernetesService: Send + Sync {
    async fn get(&self, id: &str) -> CloudResult<KubernetesCluster>;
    async fn list(&self) -> CloudResult<Vec<KubernetesCluster>>;
    async fn create(&self, request: &KubernetesClusterCreateRequest)
        -> CloudResult<KubernetesCluster>;
    async fn delete(&self, id: &str) -> CloudResult<()>;
    async fn kubeconfig(&self, id: &str) -> CloudResult<Vec<u8>>;
    async fn get_node_pool(&self, cluster_id: &str, pool_id: &str)
        -> CloudResult<KubernetesNodePool>;
    async fn list_node_pools(&self, cluster_id: &str) -> CloudResult<Vec<KubernetesNodePool>>;
    async fn create_node_pool(
        &self,
        cluster_id: &str,
        request: &KubernetesNodePoolCreateRequest,
    ) -> CloudResult<KubernetesNodePool>;
    async fn update_node_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
        request: &KubernetesNodePoolUpdateRequest,
    ) -> CloudResult<KubernetesNodePool>;
    async fn delete_node_pool(&self, cluster_id: &str, pool_id: &str) -> CloudResult<()>;
}

/// The set of cloud capabilities handed to reconcilers.
#[derive(Clone)]
pub struct CloudServices {
    pub droplets: Arc<dyn DropletService>,
    pub load_balancers: Arc<dyn LoadBalancerService>,
    pub images: Arc<dyn ImageService>,
    pub keys: Arc<dyn KeyService>,
    pub storage: Arc<dyn StorageService>,
    pub tags: Arc<dyn TagService>,
    pub domains: Arc<dyn DomainService>,
    pub kubernetes: Arc<dyn KubernetesService>,
}

impl CloudServices {
    /// Back every capability with the same HTTP client.
    #[must_use]
    pub fn from_client(client: DoClient) -> Self {
        let client = Arc::new(client);
        Self {
            droplets: client.clone(),
            load_balancers: client.clone(),
            images: client.clone(),
            keys: client.clone(),
            storage: client.clone(),
            tags: client.clone(),
            domains: client.clone(),
            kubernetes: client,
        }
    }
}

impl std::fmt::Debug for CloudServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudServices").finish_non_exhaustive()
    }
}
