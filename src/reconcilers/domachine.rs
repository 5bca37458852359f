// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DOMachine` reconciliation.
//!
//! A `DOMachine` owns one droplet and its data-disk volumes. The droplet is
//! created once the cluster infrastructure is ready and the bootstrap data
//! exists, then followed until it is active.
//!
//! Droplet states:
//!
//! ```text
//! (none) ──create──▶ new ──▶ active (ready)
//!                      └────▶ anything else (terminal UpdateMachineError)
//! ```

pub mod droplet;
pub mod tags;
pub mod volumes;

use crate::capi::{get_cluster, get_owner_machine, is_paused};
use crate::cloud::types::Droplet;
use crate::constants::{
    BOOTSTRAP_DATA_SECRET_KEY, DROPLET_DELETE_REQUEUE_SECS, DROPLET_PENDING_REQUEUE_SECS,
    DROPLET_STATUS_ACTIVE, DROPLET_STATUS_NEW, FINALIZER_DO_MACHINE,
};
use crate::context::Context;
use crate::crd::{DOCluster, DOMachine, DOResourceStatus, MachineAddress, MachineAddressType};
use crate::errors::{CloudResultExt, ReconcileError};
use crate::events::{actions, publish_all, reasons, PendingEvent};
use crate::metrics;
use crate::reconcilers::finalizers::{add_finalizer, is_deleting, remove_finalizer};
use crate::reconcilers::Outcome;
use crate::scope::{MachineScope, PatchHelper};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

const UPDATE_MACHINE_ERROR: &str = "UpdateMachineError";

/// Reconcile a `DOMachine` fetched by the controller.
///
/// # Errors
///
/// Returns an error if an owner lookup, a cloud call or the final patch fails.
pub async fn reconcile_domachine(
    ctx: Arc<Context>,
    do_machine: Arc<DOMachine>,
) -> Result<Outcome, ReconcileError> {
    let do_machine = (*do_machine).clone();
    let namespace = do_machine.namespace().unwrap_or_default();
    let name = do_machine.name_any();

    let Some(machine) = get_owner_machine(&ctx.client, &do_machine.metadata).await? else {
        info!(namespace = %namespace, name = %name, "Waiting for Machine Controller to set OwnerRef on DOMachine");
        return Ok(Outcome::Done);
    };
    let Some(cluster) = get_cluster(&ctx.client, &namespace, &machine.spec.cluster_name).await?
    else {
        info!(namespace = %namespace, name = %name, "Machine is missing cluster label or cluster does not exist");
        return Ok(Outcome::Done);
    };
    if is_paused(&cluster, &do_machine.metadata) {
        info!(namespace = %namespace, name = %name, "DOMachine or linked Cluster is marked as paused, not reconciling");
        return Ok(Outcome::Done);
    }
    let Some(do_cluster) = get_infrastructure_cluster(&ctx.client, &namespace, &cluster).await?
    else {
        info!(namespace = %namespace, name = %name, "DOCluster is not available yet");
        return Ok(Outcome::Done);
    };

    let deleting = is_deleting(&do_machine);
    let bootstrap_data = if deleting {
        None
    } else {
        get_bootstrap_data(
            &ctx.client,
            &namespace,
            machine.spec.bootstrap.data_secret_name.as_deref(),
        )
        .await?
    };

    let api: Api<DOMachine> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = PatchHelper::new(&do_machine)?;
    let mut scope = MachineScope::new(cluster, machine, do_cluster, do_machine, ctx.cloud.clone())
        .with_bootstrap_data(bootstrap_data);

    let result = if deleting {
        reconcile_delete(&mut scope).await
    } else {
        reconcile_normal(&mut scope).await
    };

    let patched = patch.patch(&api, &scope.do_machine).await;
    publish_all(
        ctx.events.as_ref(),
        &scope.do_machine.object_ref(&()),
        &scope.events,
    )
    .await;
    let outcome = result?;
    patched?;
    Ok(outcome)
}

/// `DOCluster` referenced as the infrastructure of `cluster`.
async fn get_infrastructure_cluster(
    client: &Client,
    namespace: &str,
    cluster: &crate::capi::Cluster,
) -> Result<Option<DOCluster>, ReconcileError> {
    let Some(name) = cluster
        .spec
        .infrastructure_ref
        .as_ref()
        .and_then(|r| r.name.clone())
    else {
        return Ok(None);
    };
    Ok(Api::<DOCluster>::namespaced(client.clone(), namespace)
        .get_opt(&name)
        .await?)
}

/// Bootstrap data stored under the `value` key, `None` until the bootstrap
/// provider has written it.
async fn get_bootstrap_data(
    client: &Client,
    namespace: &str,
    secret_name: Option<&str>,
) -> Result<Option<String>, ReconcileError> {
    let Some(secret_name) = secret_name.filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let Some(secret) = Api::<Secret>::namespaced(client.clone(), namespace)
        .get_opt(secret_name)
        .await?
    else {
        return Ok(None);
    };
    let value = secret
        .data
        .as_ref()
        .and_then(|data| data.get(BOOTSTRAP_DATA_SECRET_KEY))
        .ok_or_else(|| {
            ReconcileError::Precondition(format!(
                "bootstrap data secret {namespace}/{secret_name} has no \"{BOOTSTRAP_DATA_SECRET_KEY}\" key"
            ))
        })?;
    String::from_utf8(value.0.clone()).map(Some).map_err(|_| {
        ReconcileError::Precondition(format!(
            "bootstrap data secret {namespace}/{secret_name} is not valid UTF-8"
        ))
    })
}

/// Bring the droplet towards the machine spec.
///
/// Terminal errors are recorded in the failure fields and end the reconcile
/// successfully; the machine is not touched again afterwards.
///
/// # Errors
///
/// Returns retryable errors from cloud calls.
pub async fn reconcile_normal(scope: &mut MachineScope) -> Result<Outcome, ReconcileError> {
    add_finalizer(&mut scope.do_machine, FINALIZER_DO_MACHINE);

    if scope.has_failed() {
        info!(machine = %scope.name(), "Error state detected, skipping reconciliation");
        return Ok(Outcome::Done);
    }

    match reconcile_instance(scope).await {
        Err(ReconcileError::Terminal { reason, message }) => {
            warn!(machine = %scope.name(), reason, message = %message, "Machine failed permanently");
            scope.set_failure(reason, message);
            Ok(Outcome::Done)
        }
        other => other,
    }
}

async fn reconcile_instance(scope: &mut MachineScope) -> Result<Outcome, ReconcileError> {
    if !scope.cluster.infrastructure_ready() {
        info!(machine = %scope.name(), "Cluster infrastructure is not ready yet");
        return Ok(Outcome::Done);
    }
    let Some(bootstrap_data) = scope.bootstrap_data.clone() else {
        info!(machine = %scope.name(), "Bootstrap data secret reference is not yet available");
        return Ok(Outcome::Done);
    };

    let droplet_id = scope.droplet_id()?;
    let droplet = match droplet::find(scope, droplet_id).await? {
        Some(droplet) => droplet,
        None => droplet::create(scope, &bootstrap_data).await?,
    };

    scope.set_provider_id(droplet.id);
    tags::reconcile(scope, &droplet).await?;
    scope.set_addresses(addresses(&droplet));
    scope.set_volumes(droplet.volume_ids.clone());
    scope.set_instance_status(DOResourceStatus::from_droplet_status(&droplet.status));

    match droplet.status.as_str() {
        DROPLET_STATUS_NEW => {
            debug!(droplet_id = droplet.id, "Droplet is pending");
            Ok(Outcome::requeue_secs(DROPLET_PENDING_REQUEUE_SECS))
        }
        DROPLET_STATUS_ACTIVE => {
            let was_ready = scope.do_machine.status.as_ref().is_some_and(|s| s.ready);
            if !was_ready {
                info!(droplet_id = droplet.id, "Droplet is active");
                scope.record(PendingEvent::normal(
                    reasons::INSTANCE_READY,
                    actions::RECONCILE,
                    format!("Droplet {} is active", droplet.id),
                ));
            }
            scope.set_ready(true);
            Ok(Outcome::Done)
        }
        other => {
            scope.set_ready(false);
            scope.record(PendingEvent::warning(
                reasons::INSTANCE_STATUS_ERROR,
                actions::RECONCILE,
                format!("Droplet {} has unexpected status {other}", droplet.id),
            ));
            Err(ReconcileError::Terminal {
                reason: UPDATE_MACHINE_ERROR,
                message: format!("droplet status {other:?} is unexpected"),
            })
        }
    }
}

/// Machine addresses of a droplet: private IPv4 first, then public.
#[must_use]
pub fn addresses(droplet: &Droplet) -> Vec<MachineAddress> {
    let mut addresses = Vec::with_capacity(2);
    if let Some(ip) = droplet.private_ipv4() {
        addresses.push(MachineAddress {
            address_type: MachineAddressType::InternalIp,
            address: ip.to_string(),
        });
    }
    if let Some(ip) = droplet.public_ipv4() {
        addresses.push(MachineAddress {
            address_type: MachineAddressType::ExternalIp,
            address: ip.to_string(),
        });
    }
    addresses
}

/// Delete the droplet, then its volumes, then release the finalizer.
///
/// # Errors
///
/// Returns an error if a cloud call fails; the finalizer stays in place.
pub async fn reconcile_delete(scope: &mut MachineScope) -> Result<Outcome, ReconcileError> {
    // A malformed providerID must not block deletion; fall back to tags.
    let droplet_id = scope.droplet_id().unwrap_or_default();

    let Some(droplet) = droplet::find(scope, droplet_id).await? else {
        info!(machine = %scope.name(), "Unable to locate droplet instance");
        scope.record(PendingEvent::warning(
            reasons::NO_INSTANCE_FOUND,
            actions::DELETE,
            "Unable to find matching droplet",
        ));
        volumes::delete(scope).await?;
        remove_finalizer(&mut scope.do_machine, FINALIZER_DO_MACHINE);
        return Ok(Outcome::Done);
    };

    info!(droplet_id = droplet.id, "Deleting droplet");
    match scope.cloud.droplets.delete(droplet.id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e).during(format!("deleting droplet {}", droplet.id)),
    }
    metrics::record_resource_deleted("droplet");
    scope.record(PendingEvent::normal(
        reasons::INSTANCE_DELETED,
        actions::DELETE,
        format!("Droplet {} deleted", droplet.id),
    ));

    if scope.do_machine.spec.data_disks.is_empty() {
        remove_finalizer(&mut scope.do_machine, FINALIZER_DO_MACHINE);
        return Ok(Outcome::Done);
    }
    Ok(Outcome::requeue_secs(DROPLET_DELETE_REQUEUE_SECS))
}

#[cfg(test)]
#[path = "domachine_tests.rs"]
mod domachine_tests;
