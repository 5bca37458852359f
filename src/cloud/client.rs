// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! reqwest-backed DigitalOcean API client.
//!
//! All calls go through [`DoClient::request`], which authenticates with the
//! account token, retries rate limits, server errors and transport failures
//! with exponential backoff, and maps error responses onto [`CloudError`].

use super::types::{
    DomainRecord, DomainRecordEditRequest, Droplet, DropletCreateRequest, Image, Key,
    KeyCreateRequest, KubernetesCluster, KubernetesClusterCreateRequest, KubernetesNodePool,
    KubernetesNodePoolCreateRequest, KubernetesNodePoolUpdateRequest, Links, LoadBalancer,
    LoadBalancerRequest, Tag, TagResource, Volume, VolumeCreateRequest,
};
use super::{
    CloudError, CloudResult, DomainService, DropletService, ImageService, KeyService,
    KubernetesService, LoadBalancerService, StorageService, TagService,
};
use crate::constants::{
    DO_ACCESS_TOKEN_ENV, DO_LIST_PAGE_SIZE, DO_MAX_REQUEST_ATTEMPTS, DO_REQUEST_TIMEOUT_SECS,
    DO_USER_AGENT,
};
use crate::metrics;
use crate::reconcilers::retry::{http_backoff, is_retryable_http_status};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use url::Url;

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    message: String,
}

/// One logical API call, replayable across retries.
struct Call {
    method: Method,
    url: Url,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
    /// Resource kind and identifier used in `NotFound` errors.
    resource: &'static str,
    id: String,
}

impl Call {
    fn new(method: Method, url: Url, resource: &'static str, id: impl Into<String>) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: None,
            resource,
            id: id.into(),
        }
    }

    fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    fn json<B: Serialize>(mut self, body: &B) -> CloudResult<Self> {
        self.body =
            Some(serde_json::to_value(body).map_err(|e| CloudError::Decode(e.to_string()))?);
        Ok(self)
    }

    /// First path segment after `/v2`, used as a low-cardinality metric label.
    fn endpoint(&self) -> String {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.nth(1))
            .unwrap_or_default()
            .to_string()
    }
}

/// DigitalOcean API client.
#[derive(Clone)]
pub struct DoClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    max_attempts: u32,
}

impl std::fmt::Debug for DoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoClient")
            .field("base_url", &self.base_url.as_str())
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Whether repeating `method` cannot duplicate a cloud object.
pub(crate) fn is_idempotent(method: &Method) -> bool {
    !matches!(*method, Method::POST | Method::PATCH)
}

impl DoClient {
    /// Create a client for `base_url` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str, token: impl Into<String>) -> CloudResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CloudError::Transport(format!("invalid API URL {base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent(DO_USER_AGENT)
            .timeout(Duration::from_secs(DO_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
            max_attempts: DO_MAX_REQUEST_ATTEMPTS,
        })
    }

    /// Create a client reading the token from `DIGITALOCEAN_ACCESS_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or empty.
    pub fn from_env(base_url: &str) -> CloudResult<Self> {
        let token = std::env::var(DO_ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                CloudError::Transport(format!("{DO_ACCESS_TOKEN_ENV} is not set"))
            })?;
        Self::new(base_url, token)
    }

    /// Cap the number of attempts per call (1 disables retries).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn url(&self, segments: &[&str]) -> CloudResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CloudError::Transport(format!("API URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("v2")
            .extend(segments);
        Ok(url)
    }

    /// Execute `call`, retrying transient failures.
    ///
    /// POST may have taken effect before a timeout or 5xx, so it is only
    /// retried on 429; the reconciler's find-then-create handles the rest.
    async fn request(&self, call: &Call) -> CloudResult<reqwest::Response> {
        let idempotent = is_idempotent(&call.method);
        let mut backoff = http_backoff();
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.request_once(call).await;
            let outcome = match &result {
                Ok(response) => response.status().as_str().to_string(),
                Err(_) => "transport_error".to_string(),
            };
            metrics::record_cloud_request(
                call.method.as_str(),
                &call.endpoint(),
                &outcome,
                started.elapsed(),
            );

            let retryable = match &result {
                Ok(response) => {
                    let status = response.status();
                    is_retryable_http_status(status)
                        && (idempotent || status == StatusCode::TOO_MANY_REQUESTS)
                }
                Err(_) => idempotent,
            };
            if !retryable {
                if attempt > 1 {
                    debug!(
                        method = %call.method,
                        url = %call.url,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "DigitalOcean API call succeeded after retries"
                    );
                }
                return result;
            }

            let next = if attempt < self.max_attempts {
                backoff.next_backoff()
            } else {
                None
            };
            let Some(duration) = next else {
                error!(
                    method = %call.method,
                    url = %call.url,
                    attempt = attempt,
                    elapsed = ?start_time.elapsed(),
                    "DigitalOcean API retries exhausted"
                );
                return result;
            };

            warn!(
                method = %call.method,
                url = %call.url,
                attempt = attempt,
                retry_after = ?duration,
                outcome = %outcome,
                "Retryable DigitalOcean API error, will retry"
            );
            tokio::time::sleep(duration).await;
        }
    }

    async fn request_once(&self, call: &Call) -> CloudResult<reqwest::Response> {
        debug!(method = %call.method, url = %call.url, "DigitalOcean API request");

        let mut builder = self
            .http
            .request(call.method.clone(), call.url.clone())
            .bearer_auth(&self.token);
        if !call.query.is_empty() {
            builder = builder.query(&call.query);
        }
        if let Some(body) = &call.body {
            builder = builder.json(body);
        }

        builder
            .send()
            .await
            .map_err(|e| CloudError::Transport(format!("{} {}: {e}", call.method, call.url)))
    }

    /// Map a non-2xx response onto [`CloudError`].
    async fn error_from(call: &Call, response: reqwest::Response) -> CloudError {
        let status = response.status();
        let body: ApiErrorBody = response.json().await.unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND => CloudError::NotFound {
                resource: call.resource,
                id: call.id.clone(),
            },
            StatusCode::TOO_MANY_REQUESTS => CloudError::RateLimited {
                message: body.message,
            },
            _ => CloudError::Api {
                status: status.as_u16(),
                id: body.id,
                message: body.message,
            },
        }
    }

    async fn send(&self, call: &Call) -> CloudResult<reqwest::Response> {
        let response = self.request(call).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(call, response).await)
        }
    }

    /// Send `call` and decode the object under `key` in the response body.
    async fn fetch<T: DeserializeOwned>(&self, call: &Call, key: &str) -> CloudResult<T> {
        let mut value: Value = self
            .send(call)
            .await?
            .json()
            .await
            .map_err(|e| CloudError::Decode(e.to_string()))?;
        take(&mut value, key)
    }

    /// Send `call` and discard the (usually empty) body.
    async fn execute(&self, call: &Call) -> CloudResult<()> {
        self.send(call).await.map(|_| ())
    }

    /// Collect every page of a list endpoint.
    async fn list_all<T: DeserializeOwned>(&self, call: Call, key: &str) -> CloudResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1_u32;

        loop {
            let paged = Call {
                query: call
                    .query
                    .iter()
                    .cloned()
                    .chain([
                        ("page", page.to_string()),
                        ("per_page", DO_LIST_PAGE_SIZE.to_string()),
                    ])
                    .collect(),
                method: call.method.clone(),
                url: call.url.clone(),
                body: None,
                resource: call.resource,
                id: call.id.clone(),
            };
            let mut value: Value = self
                .send(&paged)
                .await?
                .json()
                .await
                .map_err(|e| CloudError::Decode(e.to_string()))?;

            let mut batch: Vec<T> = take(&mut value, key)?;
            let links: Links = match value.get_mut("links") {
                Some(links) => serde_json::from_value(links.take()).unwrap_or_default(),
                None => Links::default(),
            };
            let done = batch.is_empty() || !links.has_next();
            items.append(&mut batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }
}

/// Remove `key` from a response envelope and decode it.
fn take<T: DeserializeOwned>(value: &mut Value, key: &str) -> CloudResult<T> {
    let inner = value
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| CloudError::Decode(format!("response has no `{key}` field")))?;
    serde_json::from_value(inner).map_err(|e| CloudError::Decode(format!("`{key}`: {e}")))
}

#[async_trait]
impl DropletService for DoClient {
    async fn get(&self, id: u64) -> CloudResult<Droplet> {
        let id = id.to_string();
        let call = Call::new(Method::GET, self.url(&["droplets", &id])?, "droplet", id);
        self.fetch(&call, "droplet").await
    }

    async fn list_by_tag(&self, tag: &str) -> CloudResult<Vec<Droplet>> {
        let call = Call::new(Method::GET, self.url(&["droplets"])?, "droplet", tag)
            .query("tag_name", tag);
        self.list_all(call, "droplets").await
    }

    async fn create(&self, request: &DropletCreateRequest) -> CloudResult<Droplet> {
        let call = Call::new(Method::POST, self.url(&["droplets"])?, "droplet", &request.name)
            .json(request)?;
        self.fetch(&call, "droplet").await
    }

    async fn delete(&self, id: u64) -> CloudResult<()> {
        let id = id.to_string();
        let call = Call::new(Method::DELETE, self.url(&["droplets", &id])?, "droplet", id);
        self.execute(&call).await
    }
}

#[async_trait]
impl LoadBalancerService for DoClient {
    async fn get(&self, id: &str) -> CloudResult<LoadBalancer> {
        let call = Call::new(Method::GET, self.url(&["load_balancers", id])?, "load balancer", id);
        self.fetch(&call, "load_balancer").await
    }

    async fn list(&self) -> CloudResult<Vec<LoadBalancer>> {
        let call = Call::new(Method::GET, self.url(&["load_balancers"])?, "load balancer", "");
        self.list_all(call, "load_balancers").await
    }

    async fn create(&self, request: &LoadBalancerRequest) -> CloudResult<LoadBalancer> {
        let call = Call::new(
            Method::POST,
            self.url(&["load_balancers"])?,
            "load balancer",
            &request.name,
        )
        .json(request)?;
        self.fetch(&call, "load_balancer").await
    }

    async fn update(&self, id: &str, request: &LoadBalancerRequest) -> CloudResult<LoadBalancer> {
        let call = Call::new(Method::PUT, self.url(&["load_balancers", id])?, "load balancer", id)
            .json(request)?;
        self.fetch(&call, "load_balancer").await
    }

    async fn delete(&self, id: &str) -> CloudResult<()> {
        let call =
            Call::new(Method::DELETE, self.url(&["load_balancers", id])?, "load balancer", id);
        self.execute(&call).await
    }
}

#[async_trait]
impl ImageService for DoClient {
    async fn get_by_id(&self, id: u64) -> CloudResult<Image> {
        let id = id.to_string();
        let call = Call::new(Method::GET, self.url(&["images", &id])?, "image", id);
        self.fetch(&call, "image").await
    }

    async fn get_by_slug(&self, slug: &str) -> CloudResult<Image> {
        let call = Call::new(Method::GET, self.url(&["images", slug])?, "image", slug);
        self.fetch(&call, "image").await
    }
}

#[async_trait]
impl KeyService for DoClient {
    async fn get_by_id(&self, id: u64) -> CloudResult<Key> {
        let id = id.to_string();
        let call = Call::new(Method::GET, self.url(&["account", "keys", &id])?, "ssh key", id);
        self.fetch(&call, "ssh_key").await
    }

    async fn get_by_fingerprint(&self, fingerprint: &str) -> CloudResult<Key> {
        let call = Call::new(
            Method::GET,
            self.url(&["account", "keys", fingerprint])?,
            "ssh key",
            fingerprint,
        );
        self.fetch(&call, "ssh_key").await
    }

    async fn list(&self) -> CloudResult<Vec<Key>> {
        let call = Call::new(Method::GET, self.url(&["account", "keys"])?, "ssh key", "");
        self.list_all(call, "ssh_keys").await
    }

    async fn create(&self, request: &KeyCreateRequest) -> CloudResult<Key> {
        let call = Call::new(
            Method::POST,
            self.url(&["account", "keys"])?,
            "ssh key",
            &request.name,
        )
        .json(request)?;
        self.fetch(&call, "ssh_key").await
    }

    async fn delete_by_fingerprint(&self, fingerprint: &str) -> CloudResult<()> {
        let call = Call::new(
            Method::DELETE,
            self.url(&["account", "keys", fingerprint])?,
            "ssh key",
            fingerprint,
        );
        self.execute(&call).await
    }
}

#[async_trait]
impl StorageService for DoClient {
    async fn list_by_name(&self, name: &str, region: &str) -> CloudResult<Vec<Volume>> {
        let call = Call::new(Method::GET, self.url(&["volumes"])?, "volume", name)
            .query("name", name)
            .query("region", region);
        self.list_all(call, "volumes").await
    }

    async fn create(&self, request: &VolumeCreateRequest) -> CloudResult<Volume> {
        let call = Call::new(Method::POST, self.url(&["volumes"])?, "volume", &request.name)
            .json(request)?;
        self.fetch(&call, "volume").await
    }

    async fn delete(&self, id: &str) -> CloudResult<()> {
        let call = Call::new(Method::DELETE, self.url(&["volumes", id])?, "volume", id);
        self.execute(&call).await
    }
}

#[async_trait]
impl TagService for DoClient {
    async fn get(&self, name: &str) -> CloudResult<Tag> {
        let call = Call::new(Method::GET, self.url(&["tags", name])?, "tag", name);
        self.fetch(&call, "tag").await
    }

    async fn create(&self, name: &str) -> CloudResult<Tag> {
        let call = Call::new(Method::POST, self.url(&["tags"])?, "tag", name)
            .json(&json!({ "name": name }))?;
        self.fetch(&call, "tag").await
    }

    async fn tag_resources(&self, name: &str, resources: &[TagResource]) -> CloudResult<()> {
        let call = Call::new(Method::POST, self.url(&["tags", name, "resources"])?, "tag", name)
            .json(&json!({ "resources": resources }))?;
        self.execute(&call).await
    }

    async fn untag_resources(&self, name: &str, resources: &[TagResource]) -> CloudResult<()> {
        let call =
            Call::new(Method::DELETE, self.url(&["tags", name, "resources"])?, "tag", name)
                .json(&json!({ "resources": resources }))?;
        self.execute(&call).await
    }
}

#[async_trait]
impl DomainService for DoClient {
    async fn a_records_by_name(&self, domain: &str, fqdn: &str) -> CloudResult<Vec<DomainRecord>> {
        let call = Call::new(
            Method::GET,
            self.url(&["domains", domain, "records"])?,
            "domain",
            domain,
        )
        .query("type", "A")
        .query("name", fqdn);
        self.list_all(call, "domain_records").await
    }

    async fn create_record(
        &self,
        domain: &str,
        request: &DomainRecordEditRequest,
    ) -> CloudResult<DomainRecord> {
        let call = Call::new(
            Method::POST,
            self.url(&["domains", domain, "records"])?,
            "domain",
            domain,
        )
        .json(request)?;
        self.fetch(&call, "domain_record").await
    }

    async fn edit_record(
        &self,
        domain: &str,
        id: u64,
        request: &DomainRecordEditRequest,
    ) -> CloudResult<DomainRecord> {
        let record = id.to_string();
        let call = Call::new(
            Method::PUT,
            self.url(&["domains", domain, "records", &record])?,
            "domain record",
            record.clone(),
        )
        .json(request)?;
        self.fetch(&call, "domain_record").await
    }

    async fn delete_record(&self, domain: &str, id: u64) -> CloudResult<()> {
        let record = id.to_string();
        let call = Call::new(
            Method::DELETE,
            self.url(&["domains", domain, "records", &record])?,
            "domain record",
            record.clone(),
        );
        self.execute(&call).await
    }
}

#[async_trait]
impl KubernetesService for DoClient {
    async fn get(&self, id: &str) -> CloudResult<KubernetesCluster> {
        let call = Call::new(
            Method::GET,
            self.url(&["kubernetes", "clusters", id])?,
            "kubernetes cluster",
            id,
        );
        self.fetch(&call, "kubernetes_cluster").await
    }

    async fn list(&self) -> CloudResult<Vec<KubernetesCluster>> {
        let call = Call::new(
            Method::GET,
            self.url(&["kubernetes", "clusters"])?,
            "kubernetes cluster",
            "",
        );
        self.list_all(call, "kubernetes_clusters").await
    }

    async fn create(
        &self,
        request: &KubernetesClusterCreateRequest,
    ) -> CloudResult<KubernetesCluster> {
        let call = Call::new(
            Method::POST,
            self.url(&["kubernetes", "clusters"])?,
            "kubernetes cluster",
            &request.name,
        )
        .json(request)?;
        self.fetch(&call, "kubernetes_cluster").await
    }

    async fn delete(&self, id: &str) -> CloudResult<()> {
        let call = Call::new(
            Method::DELETE,
            self.url(&["kubernetes", "clusters", id])?,
            "kubernetes cluster",
            id,
        );
        self.execute(&call).await
    }

    async fn kubeconfig(&self, id: &str) -> CloudResult<Vec<u8>> {
        let call = Call::new(
            Method::GET,
            self.url(&["kubernetes", "clusters", id, "kubeconfig"])?,
            "kubernetes cluster",
            id,
        );
        let bytes = self
            .send(&call)
            .await?
            .bytes()
            .await
            .map_err(|e| CloudError::Decode(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn get_node_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
    ) -> CloudResult<KubernetesNodePool> {
        let call = Call::new(
            Method::GET,
            self.url(&["kubernetes", "clusters", cluster_id, "node_pools", pool_id])?,
            "node pool",
            pool_id,
        );
        self.fetch(&call, "node_pool").await
    }

    async fn list_node_pools(&self, cluster_id: &str) -> CloudResult<Vec<KubernetesNodePool>> {
        let call = Call::new(
            Method::GET,
            self.url(&["kubernetes", "clusters", cluster_id, "node_pools"])?,
            "kubernetes cluster",
            cluster_id,
        );
        self.list_all(call, "node_pools").await
    }

    async fn create_node_pool(
        &self,
        cluster_id: &str,
        request: &KubernetesNodePoolCreateRequest,
    ) -> CloudResult<KubernetesNodePool> {
        let call = Call::new(
            Method::POST,
            self.url(&["kubernetes", "clusters", cluster_id, "node_pools"])?,
            "kubernetes cluster",
            cluster_id,
        )
        .json(request)?;
        self.fetch(&call, "node_pool").await
    }

    async fn update_node_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
        request: &KubernetesNodePoolUpdateRequest,
    ) -> CloudResult<KubernetesNodePool> {
        let call = Call::new(
            Method::PUT,
            self.url(&["kubernetes", "clusters", cluster_id, "node_pools", pool_id])?,
            "node pool",
            pool_id,
        )
        .json(request)?;
        self.fetch(&call, "node_pool").await
    }

    async fn delete_node_pool(&self, cluster_id: &str, pool_id: &str) -> CloudResult<()> {
        let call = Call::new(
            Method::DELETE,
            self.url(&["kubernetes", "clusters", cluster_id, "node_pools", pool_id])?,
            "node pool",
            pool_id,
        );
        self.execute(&call).await
    }
}
