// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API server load balancer of a `DOCluster`.

use crate::cloud::types::{ForwardingRule, HealthCheck, LoadBalancer, LoadBalancerRequest};
use crate::errors::{CloudResultExt, ReconcileError};
use crate::events::{actions, reasons, PendingEvent};
use crate::metrics;
use crate::scope::ClusterScope;
use tracing::{debug, info, warn};

const TCP: &str = "tcp";

/// Create/update request matching the cluster's load balancer settings.
#[must_use]
pub fn desired_request(scope: &ClusterScope) -> LoadBalancerRequest {
    let spec = scope.load_balancer_spec();
    let health = &spec.health_check;
    LoadBalancerRequest {
        name: scope.load_balancer_name(),
        algorithm: spec.algorithm.as_str().to_string(),
        region: scope.region().to_string(),
        forwarding_rules: vec![ForwardingRule {
            entry_protocol: TCP.to_string(),
            entry_port: spec.port,
            target_protocol: TCP.to_string(),
            target_port: spec.port,
        }],
        health_check: HealthCheck {
            protocol: TCP.to_string(),
            port: spec.port,
            check_interval_seconds: health.interval,
            response_timeout_seconds: health.timeout,
            unhealthy_threshold: health.unhealthy_threshold,
            healthy_threshold: health.healthy_threshold,
        },
        tag: scope.load_balancer_tag(),
        vpc_uuid: scope.vpc_uuid().to_string(),
    }
}

/// Find the cluster's load balancer.
///
/// Lookup order: the ID recorded in status, the ID given in spec, then a
/// listing matched by name or ownership tag. A stale ID falls through to
/// the listing.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails for a reason other than 404.
pub async fn find(scope: &ClusterScope) -> Result<Option<LoadBalancer>, ReconcileError> {
    let known_ids = [
        scope.load_balancer_id(),
        scope.load_balancer_spec().resource_id.clone(),
    ];
    for id in known_ids.into_iter().flatten().filter(|id| !id.is_empty()) {
        match scope.cloud.load_balancers.get(&id).await {
            Ok(lb) => return Ok(Some(lb)),
            Err(e) if e.is_not_found() => {
                debug!(load_balancer_id = %id, "Recorded load balancer not found");
            }
            Err(e) => return Err(e).during(format!("getting load balancer {id}")),
        }
    }

    let name = scope.load_balancer_name();
    let tag = scope.load_balancer_tag();
    let found = scope
        .cloud
        .load_balancers
        .list()
        .await
        .during("listing load balancers")?
        .into_iter()
        .find(|lb| lb.name == name || lb.tag == tag);
    Ok(found)
}

/// Ensure the load balancer exists with the cluster's ownership tag.
///
/// # Errors
///
/// Returns a precondition error when the load balancer named in spec does
/// not exist, and cloud errors otherwise.
pub async fn reconcile(scope: &mut ClusterScope) -> Result<LoadBalancer, ReconcileError> {
    let desired = desired_request(scope);

    let Some(existing) = find(scope).await? else {
        if let Some(id) = scope
            .load_balancer_spec()
            .resource_id
            .as_deref()
            .filter(|id| !id.is_empty())
        {
            return Err(ReconcileError::Precondition(format!(
                "load balancer \"{id}\" given in spec does not exist"
            )));
        }
        return create(scope, &desired).await;
    };

    if existing.tag == desired.tag {
        return Ok(existing);
    }

    info!(
        load_balancer_id = %existing.id,
        current_tag = %existing.tag,
        tag = %desired.tag,
        "Load balancer is missing the cluster tag, updating"
    );
    let updated = scope
        .cloud
        .load_balancers
        .update(&existing.id, &desired)
        .await
        .during(format!("updating load balancer {}", existing.id))?;
    metrics::record_resource_updated("load_balancer");
    scope.record(PendingEvent::normal(
        reasons::LOAD_BALANCER_UPDATED,
        actions::UPDATE,
        format!("Updated load balancer {}", updated.id),
    ));
    Ok(updated)
}

async fn create(
    scope: &mut ClusterScope,
    request: &LoadBalancerRequest,
) -> Result<LoadBalancer, ReconcileError> {
    info!(name = %request.name, region = %request.region, "Creating load balancer");
    match scope.cloud.load_balancers.create(request).await {
        Ok(lb) => {
            metrics::record_resource_created("load_balancer");
            scope.record(PendingEvent::normal(
                reasons::LOAD_BALANCER_CREATED,
                actions::CREATE,
                format!("Created load balancer {} ({})", lb.name, lb.id),
            ));
            Ok(lb)
        }
        Err(e) => {
            warn!(name = %request.name, error = %e, "Failed to create load balancer");
            scope.record(PendingEvent::warning(
                reasons::LOAD_BALANCER_ERROR,
                actions::CREATE,
                format!("Failed to create load balancer {}: {e}", request.name),
            ));
            Err(e).during("creating load balancer")
        }
    }
}

/// Delete the load balancer if it still exists. Returns whether one was deleted.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails for a reason other than 404.
pub async fn delete(scope: &mut ClusterScope) -> Result<bool, ReconcileError> {
    let Some(lb) = find(scope).await? else {
        debug!("No load balancer left to delete");
        return Ok(false);
    };

    info!(load_balancer_id = %lb.id, "Deleting load balancer");
    match scope.cloud.load_balancers.delete(&lb.id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(false),
        Err(e) => return Err(e).during(format!("deleting load balancer {}", lb.id)),
    }
    metrics::record_resource_deleted("load_balancer");
    scope.record(PendingEvent::normal(
        reasons::LOAD_BALANCER_DELETED,
        actions::DELETE,
        format!("Deleted load balancer {}", lb.id),
    ));
    Ok(true)
}
