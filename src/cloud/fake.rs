// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory DigitalOcean used by reconciler tests.
//!
//! Every call is logged; mutating calls are also logged separately so tests
//! can assert that a converged reconcile issues none. Failures are injected
//! per operation name (e.g. `droplets.create`) and stay until cleared.

use super::types::{
    DomainRecord, DomainRecordEditRequest, Droplet, DropletCreateRequest, Image, Key,
    KeyCreateRequest, KubernetesCluster, KubernetesClusterCreateRequest, KubernetesNode,
    KubernetesNodePool, KubernetesNodePoolCreateRequest, KubernetesNodePoolUpdateRequest,
    KubernetesState, LoadBalancer, LoadBalancerRequest, Region, Tag, TagResource, Volume,
    VolumeCreateRequest,
};
use super::{
    CloudError, CloudResult, CloudServices, DomainService, DropletService, ImageService,
    KeyService, KubernetesService, LoadBalancerService, StorageService, TagService,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloud contents and call log.
#[derive(Debug, Default)]
pub struct FakeState {
    pub droplets: BTreeMap<u64, Droplet>,
    pub load_balancers: BTreeMap<String, LoadBalancer>,
    pub images: Vec<Image>,
    pub keys: Vec<Key>,
    pub volumes: Vec<Volume>,
    pub tags: BTreeSet<String>,
    /// Records per domain; names are relative to the domain.
    pub records: BTreeMap<String, Vec<DomainRecord>>,
    pub clusters: BTreeMap<String, KubernetesCluster>,
    pub kubeconfigs: BTreeMap<String, Vec<u8>>,

    /// Every call as `service.operation`.
    pub calls: Vec<String>,
    /// Calls that changed cloud state.
    pub mutations: Vec<String>,
    pub droplet_requests: Vec<DropletCreateRequest>,
    pub load_balancer_requests: Vec<LoadBalancerRequest>,
    pub load_balancer_updates: Vec<(String, LoadBalancerRequest)>,
    pub volume_requests: Vec<VolumeCreateRequest>,
    pub key_requests: Vec<KeyCreateRequest>,
    pub record_requests: Vec<DomainRecordEditRequest>,
    pub cluster_requests: Vec<KubernetesClusterCreateRequest>,
    pub node_pool_updates: Vec<KubernetesNodePoolUpdateRequest>,

    failures: HashMap<String, CloudError>,
    next_id: u64,
}

impl FakeState {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        1000 + self.next_id
    }

    /// Number of calls to `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.calls.iter().filter(|call| *call == operation).count()
    }
}

/// Fake cloud backing every capability trait.
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn services(self: &Arc<Self>) -> CloudServices {
        CloudServices {
            droplets: self.clone(),
            load_balancers: self.clone(),
            images: self.clone(),
            keys: self.clone(),
            storage: self.clone(),
            tags: self.clone(),
            domains: self.clone(),
            kubernetes: self.clone(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake cloud state poisoned")
    }

    /// Make every later call to `operation` fail with `error`.
    pub fn fail(&self, operation: &str, error: CloudError) {
        self.state().failures.insert(operation.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Log the call and return the injected failure, if any.
    fn enter(&self, operation: &str, mutating: bool) -> CloudResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        state.calls.push(operation.to_string());
        if let Some(error) = state.failures.get(operation) {
            return Err(error.clone());
        }
        if mutating {
            state.mutations.push(operation.to_string());
        }
        Ok(state)
    }
}

fn not_found(resource: &'static str, id: impl ToString) -> CloudError {
    CloudError::NotFound {
        resource,
        id: id.to_string(),
    }
}

#[async_trait]
impl DropletService for FakeCloud {
    async fn get(&self, id: u64) -> CloudResult<Droplet> {
        let state = self.enter("droplets.get", false)?;
        state.droplets.get(&id).cloned().ok_or_else(|| not_found("droplet", id))
    }

    async fn list_by_tag(&self, tag: &str) -> CloudResult<Vec<Droplet>> {
        let state = self.enter("droplets.list", false)?;
        Ok(state
            .droplets
            .values()
            .filter(|droplet| droplet.tags.iter().any(|t| t == tag))
            .cloned()
            .collect())
    }

    async fn create(&self, request: &DropletCreateRequest) -> CloudResult<Droplet> {
        let mut state = self.enter("droplets.create", true)?;
        let id = state.id();
        let droplet = Droplet {
            id,
            name: request.name.clone(),
            status: "new".to_string(),
            tags: request.tags.clone(),
            region: Region {
                slug: request.region.clone(),
            },
            size_slug: request.size.clone(),
            volume_ids: request.volumes.clone(),
            vpc_uuid: request.vpc_uuid.clone(),
            ..Default::default()
        };
        state.droplet_requests.push(request.clone());
        state.droplets.insert(id, droplet.clone());
        Ok(droplet)
    }

    async fn delete(&self, id: u64) -> CloudResult<()> {
        let mut state = self.enter("droplets.delete", true)?;
        state
            .droplets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("droplet", id))
    }
}

#[async_trait]
impl LoadBalancerService for FakeCloud {
    async fn get(&self, id: &str) -> CloudResult<LoadBalancer> {
        let state = self.enter("load_balancers.get", false)?;
        state
            .load_balancers
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("load balancer", id))
    }

    async fn list(&self) -> CloudResult<Vec<LoadBalancer>> {
        let state = self.enter("load_balancers.list", false)?;
        Ok(state.load_balancers.values().cloned().collect())
    }

    async fn create(&self, request: &LoadBalancerRequest) -> CloudResult<LoadBalancer> {
        let mut state = self.enter("load_balancers.create", true)?;
        let id = format!("lb-{}", state.id());
        let lb = LoadBalancer {
            id: id.clone(),
            name: request.name.clone(),
            status: "new".to_string(),
            algorithm: request.algorithm.clone(),
            region: Region {
                slug: request.region.clone(),
            },
            forwarding_rules: request.forwarding_rules.clone(),
            health_check: request.health_check.clone(),
            tag: request.tag.clone(),
            vpc_uuid: request.vpc_uuid.clone(),
            ip: String::new(),
        };
        state.load_balancer_requests.push(request.clone());
        state.load_balancers.insert(id, lb.clone());
        Ok(lb)
    }

    async fn update(&self, id: &str, request: &LoadBalancerRequest) -> CloudResult<LoadBalancer> {
        let mut state = self.enter("load_balancers.update", true)?;
        state
            .load_balancer_updates
            .push((id.to_string(), request.clone()));
        let lb = state
            .load_balancers
            .get_mut(id)
            .ok_or_else(|| not_found("load balancer", id))?;
        lb.name = request.name.clone();
        lb.tag = request.tag.clone();
        lb.algorithm = request.algorithm.clone();
        lb.forwarding_rules = request.forwarding_rules.clone();
        lb.health_check = request.health_check.clone();
        Ok(lb.clone())
    }

    async fn delete(&self, id: &str) -> CloudResult<()> {
        let mut state = self.enter("load_balancers.delete", true)?;
        state
            .load_balancers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("load balancer", id))
    }
}

#[async_trait]
impl ImageService for FakeCloud {
    async fn get_by_id(&self, id: u64) -> CloudResult<Image> {
        let state = self.enter("images.get", false)?;
        state
            .images
            .iter()
            .find(|image| image.id == id)
            .cloned()
            .ok_or_else(|| not_found("image", id))
    }

    async fn get_by_slug(&self, slug: &str) -> CloudResult<Image> {
        let state = self.enter("images.get_by_slug", false)?;
        state
            .images
            .iter()
            .find(|image| image.slug.as_deref() == Some(slug))
            .cloned()
            .ok_or_else(|| not_found("image", slug))
    }
}

#[async_trait]
impl KeyService for FakeCloud {
    async fn get_by_id(&self, id: u64) -> CloudResult<Key> {
        let state = self.enter("keys.get", false)?;
        state
            .keys
            .iter()
            .find(|key| key.id == id)
            .cloned()
            .ok_or_else(|| not_found("ssh key", id))
    }

    async fn get_by_fingerprint(&self, fingerprint: &str) -> CloudResult<Key> {
        let state = self.enter("keys.get_by_fingerprint", false)?;
        state
            .keys
            .iter()
            .find(|key| key.fingerprint == fingerprint)
            .cloned()
            .ok_or_else(|| not_found("ssh key", fingerprint))
    }

    async fn list(&self) -> CloudResult<Vec<Key>> {
        let state = self.enter("keys.list", false)?;
        Ok(state.keys.clone())
    }

    async fn create(&self, request: &KeyCreateRequest) -> CloudResult<Key> {
        let mut state = self.enter("keys.create", true)?;
        let id = state.id();
        let key = Key {
            id,
            fingerprint: format!("fp:{id}"),
            public_key: request.public_key.clone(),
            name: request.name.clone(),
        };
        state.key_requests.push(request.clone());
        state.keys.push(key.clone());
        Ok(key)
    }

    async fn delete_by_fingerprint(&self, fingerprint: &str) -> CloudResult<()> {
        let mut state = self.enter("keys.delete", true)?;
        let before = state.keys.len();
        state.keys.retain(|key| key.fingerprint != fingerprint);
        if state.keys.len() == before {
            return Err(not_found("ssh key", fingerprint));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for FakeCloud {
    async fn list_by_name(&self, name: &str, region: &str) -> CloudResult<Vec<Volume>> {
        let state = self.enter("volumes.list", false)?;
        Ok(state
            .volumes
            .iter()
            .filter(|volume| volume.name == name && volume.region.slug == region)
            .cloned()
            .collect())
    }

    async fn create(&self, request: &VolumeCreateRequest) -> CloudResult<Volume> {
        let mut state = self.enter("volumes.create", true)?;
        let volume = Volume {
            id: format!("vol-{}", state.id()),
            name: request.name.clone(),
            region: Region {
                slug: request.region.clone(),
            },
            size_gigabytes: request.size_gigabytes,
            filesystem_type: request.filesystem_type.clone(),
            filesystem_label: request.filesystem_label.clone(),
            ..Default::default()
        };
        state.volume_requests.push(request.clone());
        state.volumes.push(volume.clone());
        Ok(volume)
    }

    async fn delete(&self, id: &str) -> CloudResult<()> {
        let mut state = self.enter("volumes.delete", true)?;
        let before = state.volumes.len();
        state.volumes.retain(|volume| volume.id != id);
        if state.volumes.len() == before {
            return Err(not_found("volume", id));
        }
        Ok(())
    }
}

#[async_trait]
impl TagService for FakeCloud {
    async fn get(&self, name: &str) -> CloudResult<Tag> {
        let state = self.enter("tags.get", false)?;
        if state.tags.contains(name) {
            Ok(Tag {
                name: name.to_string(),
            })
        } else {
            Err(not_found("tag", name))
        }
    }

    async fn create(&self, name: &str) -> CloudResult<Tag> {
        let mut state = self.enter("tags.create", true)?;
        state.tags.insert(name.to_string());
        Ok(Tag {
            name: name.to_string(),
        })
    }

    async fn tag_resources(&self, name: &str, resources: &[TagResource]) -> CloudResult<()> {
        let mut state = self.enter("tags.tag_resources", true)?;
        if !state.tags.contains(name) {
            return Err(not_found("tag", name));
        }
        for resource in resources {
            if let Some(droplet) = resource
                .resource_id
                .parse::<u64>()
                .ok()
                .and_then(|id| state.droplets.get_mut(&id))
            {
                if !droplet.tags.iter().any(|t| t == name) {
                    droplet.tags.push(name.to_string());
                }
            }
        }
        Ok(())
    }

    async fn untag_resources(&self, name: &str, resources: &[TagResource]) -> CloudResult<()> {
        let mut state = self.enter("tags.untag_resources", true)?;
        for resource in resources {
            if let Some(droplet) = resource
                .resource_id
                .parse::<u64>()
                .ok()
                .and_then(|id| state.droplets.get_mut(&id))
            {
                droplet.tags.retain(|t| t != name);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DomainService for FakeCloud {
    async fn a_records_by_name(&self, domain: &str, fqdn: &str) -> CloudResult<Vec<DomainRecord>> {
        let state = self.enter("domains.records", false)?;
        Ok(state
            .records
            .get(domain)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.record_type == "A" && format!("{}.{domain}", r.name) == fqdn)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_record(
        &self,
        domain: &str,
        request: &DomainRecordEditRequest,
    ) -> CloudResult<DomainRecord> {
        let mut state = self.enter("domains.create_record", true)?;
        let record = DomainRecord {
            id: state.id(),
            record_type: request.record_type.clone(),
            name: request.name.clone(),
            data: request.data.clone(),
            ttl: request.ttl,
        };
        state.record_requests.push(request.clone());
        state
            .records
            .entry(domain.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn edit_record(
        &self,
        domain: &str,
        id: u64,
        request: &DomainRecordEditRequest,
    ) -> CloudResult<DomainRecord> {
        let mut state = self.enter("domains.edit_record", true)?;
        state.record_requests.push(request.clone());
        let record = state
            .records
            .get_mut(domain)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| not_found("domain record", id))?;
        record.data = request.data.clone();
        record.ttl = request.ttl;
        Ok(record.clone())
    }

    async fn delete_record(&self, domain: &str, id: u64) -> CloudResult<()> {
        let mut state = self.enter("domains.delete_record", true)?;
        let records = state
            .records
            .get_mut(domain)
            .ok_or_else(|| not_found("domain", domain))?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(not_found("domain record", id));
        }
        Ok(())
    }
}

fn pool_from_request(
    id: String,
    request: &KubernetesNodePoolCreateRequest,
) -> KubernetesNodePool {
    KubernetesNodePool {
        nodes: (0..request.count)
            .map(|n| KubernetesNode {
                id: format!("{id}-node-{n}"),
                name: format!("{}-{n}", request.name),
                status: KubernetesState {
                    state: "running".to_string(),
                    message: String::new(),
                },
                droplet_id: format!("{}{n}", id.trim_start_matches("pool-")),
            })
            .collect(),
        id,
        name: request.name.clone(),
        size: request.size.clone(),
        count: request.count,
        tags: request.tags.clone(),
        auto_scale: request.auto_scale,
        min_nodes: request.min_nodes.unwrap_or_default(),
        max_nodes: request.max_nodes.unwrap_or_default(),
    }
}

#[async_trait]
impl KubernetesService for FakeCloud {
    async fn get(&self, id: &str) -> CloudResult<KubernetesCluster> {
        let state = self.enter("kubernetes.get", false)?;
        state
            .clusters
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("kubernetes cluster", id))
    }

    async fn list(&self) -> CloudResult<Vec<KubernetesCluster>> {
        let state = self.enter("kubernetes.list", false)?;
        Ok(state.clusters.values().cloned().collect())
    }

    async fn create(
        &self,
        request: &KubernetesClusterCreateRequest,
    ) -> CloudResult<KubernetesCluster> {
        let mut state = self.enter("kubernetes.create", true)?;
        let id = format!("doks-{}", state.id());
        let mut node_pools = Vec::new();
        for pool in &request.node_pools {
            let pool_id = format!("pool-{}", state.id());
            node_pools.push(pool_from_request(pool_id, pool));
        }
        let cluster = KubernetesCluster {
            endpoint: format!("https://{id}.k8s.ondigitalocean.com"),
            id: id.clone(),
            name: request.name.clone(),
            region: request.region_slug.clone(),
            version: request.version_slug.clone(),
            vpc_uuid: request.vpc_uuid.clone(),
            tags: request.tags.clone(),
            node_pools,
            status: KubernetesState {
                state: "provisioning".to_string(),
                message: String::new(),
            },
        };
        state.cluster_requests.push(request.clone());
        state.clusters.insert(id, cluster.clone());
        Ok(cluster)
    }

    async fn delete(&self, id: &str) -> CloudResult<()> {
        let mut state = self.enter("kubernetes.delete", true)?;
        state
            .clusters
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("kubernetes cluster", id))
    }

    async fn kubeconfig(&self, id: &str) -> CloudResult<Vec<u8>> {
        let state = self.enter("kubernetes.kubeconfig", false)?;
        state
            .kubeconfigs
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("kubernetes cluster", id))
    }

    async fn get_node_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
    ) -> CloudResult<KubernetesNodePool> {
        let state = self.enter("kubernetes.get_node_pool", false)?;
        state
            .clusters
            .get(cluster_id)
            .and_then(|cluster| cluster.node_pools.iter().find(|pool| pool.id == pool_id))
            .cloned()
            .ok_or_else(|| not_found("node pool", pool_id))
    }

    async fn list_node_pools(&self, cluster_id: &str) -> CloudResult<Vec<KubernetesNodePool>> {
        let state = self.enter("kubernetes.list_node_pools", false)?;
        state
            .clusters
            .get(cluster_id)
            .map(|cluster| cluster.node_pools.clone())
            .ok_or_else(|| not_found("kubernetes cluster", cluster_id))
    }

    async fn create_node_pool(
        &self,
        cluster_id: &str,
        request: &KubernetesNodePoolCreateRequest,
    ) -> CloudResult<KubernetesNodePool> {
        let mut state = self.enter("kubernetes.create_node_pool", true)?;
        let pool = pool_from_request(format!("pool-{}", state.id()), request);
        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found("kubernetes cluster", cluster_id))?;
        cluster.node_pools.push(pool.clone());
        Ok(pool)
    }

    async fn update_node_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
        request: &KubernetesNodePoolUpdateRequest,
    ) -> CloudResult<KubernetesNodePool> {
        let mut state = self.enter("kubernetes.update_node_pool", true)?;
        state.node_pool_updates.push(request.clone());
        let pool = state
            .clusters
            .get_mut(cluster_id)
            .and_then(|cluster| cluster.node_pools.iter_mut().find(|pool| pool.id == pool_id))
            .ok_or_else(|| not_found("node pool", pool_id))?;
        pool.name = request.name.clone();
        pool.count = request.count;
        pool.auto_scale = request.auto_scale;
        pool.min_nodes = request.min_nodes.unwrap_or_default();
        pool.max_nodes = request.max_nodes.unwrap_or_default();
        Ok(pool.clone())
    }

    async fn delete_node_pool(&self, cluster_id: &str, pool_id: &str) -> CloudResult<()> {
        let mut state = self.enter("kubernetes.delete_node_pool", true)?;
        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found("kubernetes cluster", cluster_id))?;
        let before = cluster.node_pools.len();
        cluster.node_pools.retain(|pool| pool.id != pool_id);
        if cluster.node_pools.len() == before {
            return Err(not_found("node pool", pool_id));
        }
        Ok(())
    }
}
