// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DOCluster` reconciliation.
//!
//! A `DOCluster` owns the API server load balancer and, optionally, a DNS
//! record for the control plane. It becomes ready once the load balancer is
//! active and the endpoint (DNS name or load balancer address) is known.

pub mod dns_record;
pub mod load_balancer;

use crate::capi::{get_owner_cluster, is_paused};
use crate::constants::{
    DNS_PENDING_REQUEUE_SECS, FINALIZER_DO_CLUSTER, LOAD_BALANCER_PENDING_REQUEUE_SECS,
    LOAD_BALANCER_STATUS_ACTIVE,
};
use crate::context::Context;
use crate::crd::DOCluster;
use crate::errors::ReconcileError;
use crate::events::{actions, publish_all, reasons, PendingEvent};
use crate::reconcilers::finalizers::{add_finalizer, is_deleting, remove_finalizer};
use crate::reconcilers::Outcome;
use crate::scope::{ClusterScope, PatchHelper};
use kube::{Api, Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Reconcile a `DOCluster` fetched by the controller.
///
/// # Errors
///
/// Returns an error if the owner lookup, a cloud call or the final patch fails.
pub async fn reconcile_docluster(
    ctx: Arc<Context>,
    do_cluster: Arc<DOCluster>,
) -> Result<Outcome, ReconcileError> {
    let do_cluster = (*do_cluster).clone();
    let namespace = do_cluster.namespace().unwrap_or_default();
    let name = do_cluster.name_any();

    let Some(cluster) = get_owner_cluster(&ctx.client, &do_cluster.metadata).await? else {
        info!(namespace = %namespace, name = %name, "Waiting for Cluster Controller to set OwnerRef on DOCluster");
        return Ok(Outcome::Done);
    };
    if is_paused(&cluster, &do_cluster.metadata) {
        info!(namespace = %namespace, name = %name, "DOCluster or linked Cluster is marked as paused, not reconciling");
        return Ok(Outcome::Done);
    }

    let api: Api<DOCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = PatchHelper::new(&do_cluster)?;
    let mut scope = ClusterScope::new(cluster, do_cluster, ctx.cloud.clone());
    if let Some(checker) = &ctx.dns {
        scope = scope.with_dns(checker.clone());
    }

    let result = if is_deleting(&scope.do_cluster) {
        reconcile_delete(&mut scope).await
    } else {
        reconcile_normal(&mut scope).await
    };

    let patched = patch.patch(&api, &scope.do_cluster).await;
    publish_all(
        ctx.events.as_ref(),
        &scope.do_cluster.object_ref(&()),
        &scope.events,
    )
    .await;
    let outcome = result?;
    patched?;
    Ok(outcome)
}

/// Drive the load balancer, endpoint and DNS record towards the spec.
///
/// # Errors
///
/// Returns an error if a cloud call or the DNS propagation check fails.
pub async fn reconcile_normal(scope: &mut ClusterScope) -> Result<Outcome, ReconcileError> {
    add_finalizer(&mut scope.do_cluster, FINALIZER_DO_CLUSTER);
    scope.apply_defaults();

    let lb = load_balancer::reconcile(scope).await?;
    scope.set_load_balancer_ref(&lb.id, &lb.status);
    if lb.status != LOAD_BALANCER_STATUS_ACTIVE || lb.ip.is_empty() {
        debug!(
            load_balancer_id = %lb.id,
            status = %lb.status,
            "Waiting for load balancer to become active"
        );
        return Ok(Outcome::requeue_secs(LOAD_BALANCER_PENDING_REQUEUE_SECS));
    }

    let mut host = lb.ip.clone();
    if let Some(dns) = scope.do_cluster.spec.control_plane_dns.clone() {
        dns_record::reconcile(scope, &dns, &lb.ip).await?;

        let was_ready = scope
            .do_cluster
            .status
            .as_ref()
            .is_some_and(|s| s.control_plane_dns_record_ready);
        if !dns_record::is_propagated(scope, &dns, &lb.ip).await? {
            info!(fqdn = %dns.fqdn(), ip = %lb.ip, "Waiting for control plane DNS record to propagate");
            scope.set_dns_record_ready(false);
            return Ok(Outcome::requeue_secs(DNS_PENDING_REQUEUE_SECS));
        }
        if !was_ready {
            scope.record(PendingEvent::normal(
                reasons::DNS_RECORD_READY,
                actions::RECONCILE,
                format!("DNS record {} resolves to {}", dns.fqdn(), lb.ip),
            ));
        }
        scope.set_dns_record_ready(true);
        host = dns.fqdn();
    }

    let port = scope.load_balancer_spec().port;
    scope.set_control_plane_endpoint(host, port);

    let was_ready = scope.do_cluster.status.as_ref().is_some_and(|s| s.ready);
    if !was_ready {
        info!(endpoint = %scope.do_cluster.spec.control_plane_endpoint.host, port, "DOCluster is ready");
        scope.record(PendingEvent::normal(
            reasons::LOAD_BALANCER_READY,
            actions::RECONCILE,
            format!("Load balancer {} is active at {}", lb.id, lb.ip),
        ));
    }
    scope.set_ready();
    Ok(Outcome::Done)
}

/// Delete the load balancer and DNS record, then release the finalizer.
///
/// # Errors
///
/// Returns an error if a cloud call fails; the finalizer stays in place.
pub async fn reconcile_delete(scope: &mut ClusterScope) -> Result<Outcome, ReconcileError> {
    info!(cluster = %scope.name(), "Deleting DOCluster infrastructure");
    load_balancer::delete(scope).await?;
    if let Some(dns) = scope.do_cluster.spec.control_plane_dns.clone() {
        dns_record::delete(scope, &dns).await?;
    }
    remove_finalizer(&mut scope.do_cluster, FINALIZER_DO_CLUSTER);
    Ok(Outcome::Done)
}

#[cfg(test)]
#[path = "docluster_tests.rs"]
mod docluster_tests;
