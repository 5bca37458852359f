// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DOKSCluster` reconciliation.
//!
//! Cluster states:
//!
//! ```text
//! (none) ──create──▶ provisioning ──▶ running (ready)
//! ```
//!
//! Any state other than `running` is polled every 30 seconds.

use crate::capi::{get_owner_cluster, is_paused};
use crate::cloud::types::{
    KubernetesCluster, KubernetesClusterCreateRequest, KubernetesNodePoolCreateRequest,
};
use crate::constants::{
    DOKS_API_SERVER_PORT, DOKS_PENDING_REQUEUE_SECS, DOKS_STATE_RUNNING, FINALIZER_DOKS_CLUSTER,
};
use crate::context::Context;
use crate::crd::{APIEndpoint, DOKSCluster};
use crate::errors::{CloudResultExt, ReconcileError};
use crate::events::{actions, publish_all, reasons, PendingEvent};
use crate::metrics;
use crate::naming::provider_id;
use crate::reconcilers::finalizers::{add_finalizer, is_deleting, remove_finalizer};
use crate::reconcilers::{status_changed, Outcome};
use crate::scope::{ManagedClusterScope, PatchHelper};
use kube::{Api, Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Reconcile a `DOKSCluster` fetched by the controller.
///
/// # Errors
///
/// Returns an error if the owner lookup, a cloud call or the final patch fails.
pub async fn reconcile_doks_cluster(
    ctx: Arc<Context>,
    doks_cluster: Arc<DOKSCluster>,
) -> Result<Outcome, ReconcileError> {
    let doks_cluster = (*doks_cluster).clone();
    let namespace = doks_cluster.namespace().unwrap_or_default();
    let name = doks_cluster.name_any();

    let Some(cluster) = get_owner_cluster(&ctx.client, &doks_cluster.metadata).await? else {
        info!(namespace = %namespace, name = %name, "Waiting for Cluster Controller to set OwnerRef on DOKSCluster");
        return Ok(Outcome::Done);
    };
    if is_paused(&cluster, &doks_cluster.metadata) {
        info!(namespace = %namespace, name = %name, "DOKSCluster or linked Cluster is marked as paused, not reconciling");
        return Ok(Outcome::Done);
    }

    let api: Api<DOKSCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = PatchHelper::new(&doks_cluster)?;
    let mut scope = ManagedClusterScope::new(cluster, doks_cluster, ctx.cloud.clone());

    let result = if is_deleting(&scope.doks_cluster) {
        reconcile_delete(&mut scope).await
    } else {
        reconcile_normal(&mut scope).await
    };

    let patched = patch.patch(&api, &scope.doks_cluster).await;
    publish_all(
        ctx.events.as_ref(),
        &scope.doks_cluster.object_ref(&()),
        &scope.events,
    )
    .await;
    let outcome = result?;
    patched?;
    Ok(outcome)
}

/// Find the managed cluster by recorded ID, then by name among the clusters
/// carrying the ownership tag.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails for a reason other than 404.
pub async fn find(
    scope: &ManagedClusterScope,
) -> Result<Option<KubernetesCluster>, ReconcileError> {
    if let Some(id) = scope.cluster_id() {
        match scope.cloud.kubernetes.get(&id).await {
            Ok(cluster) => return Ok(Some(cluster)),
            Err(e) if e.is_not_found() => {
                debug!(cluster_id = %id, "Recorded managed cluster not found");
            }
            Err(e) => return Err(e).during(format!("getting managed cluster {id}")),
        }
    }

    let name = scope.name();
    let tag = scope.ownership_tag();
    let found = scope
        .cloud
        .kubernetes
        .list()
        .await
        .during("listing managed clusters")?
        .into_iter()
        .find(|cluster| cluster.name == name && cluster.tags.contains(&tag));
    Ok(found)
}

fn create_request(scope: &ManagedClusterScope) -> KubernetesClusterCreateRequest {
    let spec = &scope.doks_cluster.spec;
    let pool = &spec.default_node_pool;
    KubernetesClusterCreateRequest {
        name: scope.name(),
        region_slug: spec.region.clone(),
        version_slug: spec.version.clone(),
        vpc_uuid: spec.vpc_uuid.clone().unwrap_or_default(),
        tags: vec![scope.ownership_tag()],
        node_pools: vec![KubernetesNodePoolCreateRequest {
            name: pool.name.clone(),
            size: pool.size.clone(),
            count: pool.count,
            tags: Vec::new(),
            auto_scale: false,
            min_nodes: None,
            max_nodes: None,
        }],
    }
}

/// Ensure the managed cluster exists and mirror its state.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails.
pub async fn reconcile_normal(scope: &mut ManagedClusterScope) -> Result<Outcome, ReconcileError> {
    add_finalizer(&mut scope.doks_cluster, FINALIZER_DOKS_CLUSTER);

    let managed = match find(scope).await? {
        Some(managed) => managed,
        None => {
            let request = create_request(scope);
            info!(
                name = %request.name,
                region = %request.region_slug,
                version = %request.version_slug,
                "Creating managed cluster"
            );
            let managed = scope
                .cloud
                .kubernetes
                .create(&request)
                .await
                .during(format!("creating managed cluster {}", request.name))?;
            metrics::record_resource_created("managed_cluster");
            scope.record(PendingEvent::normal(
                reasons::MANAGED_CLUSTER_CREATED,
                actions::CREATE,
                format!("Created managed cluster {} ({})", managed.name, managed.id),
            ));
            managed
        }
    };

    scope.doks_cluster.spec.provider_id = Some(provider_id(&managed.id));
    let state = Some(managed.status.state.clone()).filter(|s| !s.is_empty());
    let previous = scope.doks_cluster.status.as_ref().and_then(|s| s.state.clone());
    if status_changed(&previous, &state) {
        info!(
            cluster_id = %managed.id,
            from = previous.as_deref().unwrap_or("<none>"),
            to = state.as_deref().unwrap_or("<none>"),
            "Managed cluster state changed"
        );
    }
    let was_ready = scope.doks_cluster.status.as_ref().is_some_and(|s| s.ready);
    let status = scope.status_mut();
    status.cluster_id = Some(managed.id.clone());
    status.state = state;

    if managed.status.state != DOKS_STATE_RUNNING {
        status.ready = false;
        debug!(cluster_id = %managed.id, state = %managed.status.state, "Waiting for managed cluster");
        return Ok(Outcome::requeue_secs(DOKS_PENDING_REQUEUE_SECS));
    }

    let Some(host) = endpoint_host(&managed.endpoint) else {
        status.ready = false;
        debug!(cluster_id = %managed.id, "Managed cluster has no endpoint yet");
        return Ok(Outcome::requeue_secs(DOKS_PENDING_REQUEUE_SECS));
    };
    status.ready = true;
    scope.doks_cluster.spec.control_plane_endpoint = APIEndpoint {
        host,
        port: DOKS_API_SERVER_PORT,
    };
    if !was_ready {
        scope.record(PendingEvent::normal(
            reasons::MANAGED_CLUSTER_READY,
            actions::RECONCILE,
            format!("Managed cluster {} is running", managed.id),
        ));
    }
    Ok(Outcome::Done)
}

/// Host part of the managed cluster endpoint URL.
#[must_use]
pub fn endpoint_host(endpoint: &str) -> Option<String> {
    if endpoint.is_empty() {
        return None;
    }
    Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

/// Delete the managed cluster and release the finalizer.
///
/// # Errors
///
/// Returns an error if the delete call fails; the finalizer stays in place.
pub async fn reconcile_delete(scope: &mut ManagedClusterScope) -> Result<Outcome, ReconcileError> {
    match find(scope).await? {
        Some(managed) => {
            info!(cluster_id = %managed.id, "Deleting managed cluster");
            match scope.cloud.kubernetes.delete(&managed.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(e).during(format!("deleting managed cluster {}", managed.id))
                }
            }
            metrics::record_resource_deleted("managed_cluster");
            scope.record(PendingEvent::normal(
                reasons::MANAGED_CLUSTER_DELETED,
                actions::DELETE,
                format!("Deleted managed cluster {}", managed.id),
            ));
        }
        None => {
            info!(name = %scope.name(), "Managed cluster already gone");
        }
    }

    remove_finalizer(&mut scope.doks_cluster, FINALIZER_DOKS_CLUSTER);
    Ok(Outcome::Done)
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
