// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DOKSControlPlane` reconciliation.
//!
//! The control plane of a managed cluster is run by DigitalOcean. This
//! reconciler only publishes its kubeconfig as the `{cluster}` secret that
//! Cluster API expects and mirrors readiness from the `DOKSCluster`.

use crate::capi::{get_owner_cluster, is_paused};
use crate::constants::{
    DOKS_PENDING_REQUEUE_SECS, FIELD_MANAGER, KUBECONFIG_SECRET_KEY, KUBECONFIG_SECRET_TYPE,
};
use crate::context::Context;
use crate::crd::DOKSControlPlane;
use crate::errors::{CloudResultExt, ReconcileError};
use crate::events::{actions, publish_all, reasons, PendingEvent};
use crate::labels::CLUSTER_NAME_LABEL;
use crate::reconcilers::finalizers::is_deleting;
use crate::reconcilers::Outcome;
use crate::scope::{ControlPlaneScope, PatchHelper};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::get_doks_cluster;

/// Reconcile a `DOKSControlPlane` fetched by the controller.
///
/// The kubeconfig secret is written before the status so `initialized`
/// never runs ahead of the secret.
///
/// # Errors
///
/// Returns an error if a lookup, the kubeconfig download, the secret write or
/// the final patch fails.
pub async fn reconcile_doks_control_plane(
    ctx: Arc<Context>,
    control_plane: Arc<DOKSControlPlane>,
) -> Result<Outcome, ReconcileError> {
    let control_plane = (*control_plane).clone();
    let namespace = control_plane.namespace().unwrap_or_default();
    let name = control_plane.name_any();

    if is_deleting(&control_plane) {
        debug!(namespace = %namespace, name = %name, "DOKSControlPlane is being deleted, kubeconfig secret is garbage collected");
        return Ok(Outcome::Done);
    }
    let Some(cluster) = get_owner_cluster(&ctx.client, &control_plane.metadata).await? else {
        info!(namespace = %namespace, name = %name, "Waiting for Cluster Controller to set OwnerRef on DOKSControlPlane");
        return Ok(Outcome::Done);
    };
    if is_paused(&cluster, &control_plane.metadata) {
        info!(namespace = %namespace, name = %name, "DOKSControlPlane or linked Cluster is marked as paused, not reconciling");
        return Ok(Outcome::Done);
    }

    let doks_cluster = get_doks_cluster(&ctx.client, &namespace, &cluster).await?;
    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);
    let existing = secrets.get_opt(&cluster.name_any()).await?;

    let api: Api<DOKSControlPlane> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = PatchHelper::new(&control_plane)?;
    let mut scope = ControlPlaneScope::new(cluster, control_plane, doks_cluster, ctx.cloud.clone())
        .with_kubeconfig_secret(existing.clone());

    let outcome = reconcile_normal(&mut scope).await;
    if outcome.is_ok() && scope.kubeconfig_secret != existing {
        if let Some(secret) = &scope.kubeconfig_secret {
            apply_secret(&ctx.client, secret).await?;
        }
    }

    let patched = patch.patch(&api, &scope.control_plane).await;
    publish_all(
        ctx.events.as_ref(),
        &scope.control_plane.object_ref(&()),
        &scope.events,
    )
    .await;
    let outcome = outcome?;
    patched?;
    Ok(outcome)
}

async fn apply_secret(client: &Client, secret: &Secret) -> Result<(), ReconcileError> {
    let namespace = secret.namespace().unwrap_or_default();
    let name = secret.name_any();
    debug!(namespace = %namespace, name = %name, "Applying kubeconfig secret");
    Api::<Secret>::namespaced(client.clone(), &namespace)
        .patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(secret),
        )
        .await?;
    Ok(())
}

/// Kubeconfig secret for the cluster, owned by the control plane.
#[must_use]
pub fn kubeconfig_secret(scope: &ControlPlaneScope, kubeconfig: Vec<u8>) -> Secret {
    let owner = scope.control_plane.controller_owner_ref(&());
    Secret {
        metadata: ObjectMeta {
            name: Some(scope.kubeconfig_secret_name()),
            namespace: Some(scope.namespace()),
            labels: Some(BTreeMap::from([(
                CLUSTER_NAME_LABEL.to_string(),
                scope.cluster.name_any(),
            )])),
            owner_references: owner.map(|owner| vec![owner]),
            ..Default::default()
        },
        type_: Some(KUBECONFIG_SECRET_TYPE.to_string()),
        data: Some(BTreeMap::from([(
            KUBECONFIG_SECRET_KEY.to_string(),
            ByteString(kubeconfig),
        )])),
        ..Default::default()
    }
}

fn current_kubeconfig(secret: Option<&Secret>) -> Option<&[u8]> {
    secret?
        .data
        .as_ref()?
        .get(KUBECONFIG_SECRET_KEY)
        .map(|value| value.0.as_slice())
}

/// Publish the kubeconfig and mirror readiness from the `DOKSCluster`.
///
/// # Errors
///
/// Returns an error if the kubeconfig download fails.
pub async fn reconcile_normal(scope: &mut ControlPlaneScope) -> Result<Outcome, ReconcileError> {
    let version = scope
        .doks_cluster
        .as_ref()
        .map_or_else(|| scope.control_plane.spec.version.clone(), |c| c.spec.version.clone());
    let cluster_ready = scope
        .doks_cluster
        .as_ref()
        .and_then(|c| c.status.as_ref())
        .is_some_and(|s| s.ready);
    let status = scope.status_mut();
    status.external_managed_control_plane = true;
    status.version = Some(version);
    status.ready = cluster_ready;

    let Some(cluster_id) = scope.cluster_id().filter(|_| cluster_ready) else {
        debug!(name = %scope.control_plane.name_any(), "Waiting for managed cluster to be running");
        return Ok(Outcome::requeue_secs(DOKS_PENDING_REQUEUE_SECS));
    };

    let kubeconfig = scope
        .cloud
        .kubernetes
        .kubeconfig(&cluster_id)
        .await
        .during(format!("getting kubeconfig of managed cluster {cluster_id}"))?;

    if current_kubeconfig(scope.kubeconfig_secret.as_ref()) != Some(kubeconfig.as_slice()) {
        info!(
            secret = %scope.kubeconfig_secret_name(),
            cluster_id = %cluster_id,
            "Updating kubeconfig secret"
        );
        let secret = kubeconfig_secret(scope, kubeconfig);
        scope.kubeconfig_secret = Some(secret);
        scope.record(PendingEvent::normal(
            reasons::KUBECONFIG_UPDATED,
            actions::UPDATE,
            format!("Kubeconfig secret {} updated", scope.kubeconfig_secret_name()),
        ));
    }
    scope.status_mut().initialized = true;
    Ok(Outcome::Done)
}

#[cfg(test)]
#[path = "control_plane_tests.rs"]
mod control_plane_tests;
