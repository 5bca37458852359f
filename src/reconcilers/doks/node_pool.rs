// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DOKSNodePool` reconciliation.
//!
//! Each `MachinePool` of a managed cluster is backed by one DOKS node pool.
//! Without autoscaling the `MachinePool` replica count is pushed to the pool;
//! with autoscaling DigitalOcean owns the count and it is copied back into the
//! `MachinePool`.

use crate::capi::{get_cluster, get_owner_machine_pool, is_paused, MachinePool};
use crate::cloud::types::{
    KubernetesNodePool, KubernetesNodePoolCreateRequest, KubernetesNodePoolUpdateRequest,
};
use crate::constants::{DOKS_PENDING_REQUEUE_SECS, DOKS_STATE_RUNNING, FINALIZER_DOKS_NODE_POOL};
use crate::context::Context;
use crate::crd::DOKSNodePool;
use crate::errors::{CloudResultExt, ReconcileError};
use crate::events::{actions, publish_all, reasons, PendingEvent};
use crate::metrics;
use crate::naming::provider_id;
use crate::reconcilers::finalizers::{add_finalizer, is_deleting, remove_finalizer};
use crate::reconcilers::Outcome;
use crate::scope::{NodePoolScope, PatchHelper};
use kube::{Api, Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info};

use super::get_doks_cluster;

/// Reconcile a `DOKSNodePool` fetched by the controller.
///
/// Both the node pool and its `MachinePool` are patched: the latter only
/// changes when autoscaling moves the replica count.
///
/// # Errors
///
/// Returns an error if a lookup, a cloud call or one of the patches fails.
pub async fn reconcile_doks_node_pool(
    ctx: Arc<Context>,
    node_pool: Arc<DOKSNodePool>,
) -> Result<Outcome, ReconcileError> {
    let node_pool = (*node_pool).clone();
    let namespace = node_pool.namespace().unwrap_or_default();
    let name = node_pool.name_any();

    let Some(machine_pool) = get_owner_machine_pool(&ctx.client, &node_pool.metadata).await?
    else {
        info!(namespace = %namespace, name = %name, "Waiting for MachinePool Controller to set OwnerRef on DOKSNodePool");
        return Ok(Outcome::Done);
    };
    let Some(cluster) =
        get_cluster(&ctx.client, &namespace, &machine_pool.spec.cluster_name).await?
    else {
        info!(namespace = %namespace, name = %name, "MachinePool is missing cluster label or cluster does not exist");
        return Ok(Outcome::Done);
    };
    if is_paused(&cluster, &node_pool.metadata) {
        info!(namespace = %namespace, name = %name, "DOKSNodePool or linked Cluster is marked as paused, not reconciling");
        return Ok(Outcome::Done);
    }
    let doks_cluster = get_doks_cluster(&ctx.client, &namespace, &cluster).await?;

    let api: Api<DOKSNodePool> = Api::namespaced(ctx.client.clone(), &namespace);
    let pool_api: Api<MachinePool> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = PatchHelper::new(&node_pool)?;
    let pool_patch = PatchHelper::new(&machine_pool)?;
    let mut scope = NodePoolScope::new(
        cluster,
        machine_pool,
        node_pool,
        doks_cluster,
        ctx.cloud.clone(),
    );

    let result = if is_deleting(&scope.node_pool) {
        reconcile_delete(&mut scope).await
    } else {
        reconcile_normal(&mut scope).await
    };

    let patched = match patch.patch(&api, &scope.node_pool).await {
        Ok(()) => pool_patch.patch(&pool_api, &scope.machine_pool).await,
        Err(e) => Err(e),
    };
    publish_all(
        ctx.events.as_ref(),
        &scope.node_pool.object_ref(&()),
        &scope.events,
    )
    .await;
    let outcome = result?;
    patched?;
    Ok(outcome)
}

/// Find the node pool by recorded ID, then by name.
///
/// A managed cluster that no longer exists has no pools.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails for a reason other than 404.
pub async fn find(
    scope: &NodePoolScope,
    cluster_id: &str,
) -> Result<Option<KubernetesNodePool>, ReconcileError> {
    if let Some(id) = scope.node_pool_id() {
        match scope.cloud.kubernetes.get_node_pool(cluster_id, &id).await {
            Ok(pool) => return Ok(Some(pool)),
            Err(e) if e.is_not_found() => {
                debug!(node_pool_id = %id, "Recorded node pool not found");
            }
            Err(e) => return Err(e).during(format!("getting node pool {id}")),
        }
    }

    let name = scope.name();
    match scope.cloud.kubernetes.list_node_pools(cluster_id).await {
        Ok(pools) => Ok(pools.into_iter().find(|pool| pool.name == name)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e).during(format!("listing node pools of {cluster_id}")),
    }
}

/// Whether the pool has to be updated to match the spec.
fn needs_update(scope: &NodePoolScope, pool: &KubernetesNodePool) -> bool {
    let spec = &scope.node_pool.spec;
    if spec.auto_scale {
        !pool.auto_scale
            || spec.min_nodes.is_some_and(|min| min != pool.min_nodes)
            || spec.max_nodes.is_some_and(|max| max != pool.max_nodes)
    } else {
        pool.auto_scale || pool.count != scope.desired_replicas()
    }
}

fn update_request(
    scope: &NodePoolScope,
    pool: &KubernetesNodePool,
) -> KubernetesNodePoolUpdateRequest {
    let spec = &scope.node_pool.spec;
    KubernetesNodePoolUpdateRequest {
        name: pool.name.clone(),
        count: if spec.auto_scale {
            pool.count
        } else {
            scope.desired_replicas()
        },
        auto_scale: spec.auto_scale,
        min_nodes: spec.min_nodes,
        max_nodes: spec.max_nodes,
    }
}

async fn create(
    scope: &mut NodePoolScope,
    cluster_id: &str,
) -> Result<KubernetesNodePool, ReconcileError> {
    let spec = &scope.node_pool.spec;
    let request = KubernetesNodePoolCreateRequest {
        name: scope.name(),
        size: spec.size.clone(),
        count: scope.desired_replicas(),
        tags: scope.tags(),
        auto_scale: spec.auto_scale,
        min_nodes: spec.min_nodes,
        max_nodes: spec.max_nodes,
    };
    info!(
        cluster_id = %cluster_id,
        name = %request.name,
        size = %request.size,
        count = request.count,
        "Creating node pool"
    );
    let pool = scope
        .cloud
        .kubernetes
        .create_node_pool(cluster_id, &request)
        .await
        .during(format!("creating node pool {}", request.name))?;
    metrics::record_resource_created("node_pool");
    scope.record(PendingEvent::normal(
        reasons::NODE_POOL_CREATED,
        actions::CREATE,
        format!("Created node pool {} ({})", pool.name, pool.id),
    ));
    Ok(pool)
}

/// Ensure the node pool exists, converge its size and report its nodes.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails.
pub async fn reconcile_normal(scope: &mut NodePoolScope) -> Result<Outcome, ReconcileError> {
    add_finalizer(&mut scope.node_pool, FINALIZER_DOKS_NODE_POOL);

    let cluster_ready = scope
        .doks_cluster
        .as_ref()
        .and_then(|c| c.status.as_ref())
        .is_some_and(|s| s.ready);
    let Some(cluster_id) = scope.cluster_id().filter(|_| cluster_ready) else {
        info!(node_pool = %scope.name(), "Waiting for managed cluster to be running");
        return Ok(Outcome::requeue_secs(DOKS_PENDING_REQUEUE_SECS));
    };

    let mut pool = match find(scope, &cluster_id).await? {
        Some(pool) => pool,
        None => create(scope, &cluster_id).await?,
    };
    scope.status_mut().node_pool_id = Some(pool.id.clone());

    if needs_update(scope, &pool) {
        let request = update_request(scope, &pool);
        info!(
            node_pool_id = %pool.id,
            from = pool.count,
            to = request.count,
            auto_scale = request.auto_scale,
            "Updating node pool"
        );
        pool = scope
            .cloud
            .kubernetes
            .update_node_pool(&cluster_id, &pool.id, &request)
            .await
            .during(format!("updating node pool {}", pool.id))?;
        metrics::record_resource_updated("node_pool");
        scope.record(PendingEvent::normal(
            reasons::NODE_POOL_SCALED,
            actions::UPDATE,
            format!("Node pool {} set to {} nodes", pool.id, request.count),
        ));
    }

    if scope.node_pool.spec.auto_scale && scope.machine_pool.spec.replicas != Some(pool.count) {
        info!(
            machine_pool = %scope.machine_pool.name_any(),
            replicas = pool.count,
            "Copying autoscaled node count to MachinePool"
        );
        scope.machine_pool.spec.replicas = Some(pool.count);
    }

    scope.node_pool.spec.provider_id_list = pool
        .nodes
        .iter()
        .filter(|node| !node.droplet_id.is_empty())
        .map(|node| provider_id(&node.droplet_id))
        .collect();

    let running = pool
        .nodes
        .iter()
        .filter(|node| node.status.state == DOKS_STATE_RUNNING)
        .count();
    let running = i32::try_from(running).unwrap_or(i32::MAX);
    let ready = running == pool.count;
    let status = scope.status_mut();
    status.replicas = running;
    status.ready = ready;

    if ready {
        Ok(Outcome::Done)
    } else {
        debug!(node_pool_id = %pool.id, running, count = pool.count, "Waiting for node pool nodes");
        Ok(Outcome::requeue_secs(DOKS_PENDING_REQUEUE_SECS))
    }
}

/// Delete the node pool unless the whole managed cluster is going away.
///
/// # Errors
///
/// Returns an error if the delete call fails; the finalizer stays in place.
pub async fn reconcile_delete(scope: &mut NodePoolScope) -> Result<Outcome, ReconcileError> {
    if scope.managed_cluster_going_away() {
        info!(node_pool = %scope.name(), "Managed cluster is being deleted, skipping node pool deletion");
        remove_finalizer(&mut scope.node_pool, FINALIZER_DOKS_NODE_POOL);
        return Ok(Outcome::Done);
    }

    if let Some(cluster_id) = scope.cluster_id() {
        if let Some(pool) = find(scope, &cluster_id).await? {
            info!(node_pool_id = %pool.id, "Deleting node pool");
            match scope
                .cloud
                .kubernetes
                .delete_node_pool(&cluster_id, &pool.id)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e).during(format!("deleting node pool {}", pool.id)),
            }
            metrics::record_resource_deleted("node_pool");
            scope.record(PendingEvent::normal(
                reasons::NODE_POOL_DELETED,
                actions::DELETE,
                format!("Deleted node pool {}", pool.id),
            ));
        }
    }

    remove_finalizer(&mut scope.node_pool, FINALIZER_DOKS_NODE_POOL);
    Ok(Outcome::Done)
}

#[cfg(test)]
#[path = "node_pool_tests.rs"]
mod node_pool_tests;
