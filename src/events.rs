// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Events for provider resources.
//!
//! Reconcilers queue [`PendingEvent`]s on their scope while they work; the
//! controller wrapper publishes them once the object has been patched.
//! Publishing is fire-and-forget: a failed event is logged and never fails
//! the reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Publishes Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, resource_ref: &ObjectReference, event: &PendingEvent);
}

/// Publisher backed by [`kube::runtime::events::Recorder`].
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// `controller` becomes the reporting component of every event.
    #[must_use]
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, resource_ref: &ObjectReference, event: &PendingEvent) {
        let payload = Event {
            type_: event.type_,
            reason: event.reason.to_string(),
            note: Some(event.note.clone()),
            action: event.action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&payload, resource_ref).await {
            warn!(
                reason = event.reason,
                action = event.action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// An event queued during a reconcile.
#[derive(Clone, Debug)]
pub struct PendingEvent {
    pub type_: EventType,
    pub reason: &'static str,
    pub action: &'static str,
    pub note: String,
}

impl PendingEvent {
    #[must_use]
    pub fn normal(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Normal,
            reason,
            action,
            note: note.into(),
        }
    }

    #[must_use]
    pub fn warning(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            reason,
            action,
            note: note.into(),
        }
    }
}

/// Publish queued events in order.
pub async fn publish_all(
    publisher: &dyn EventPublisher,
    resource_ref: &ObjectReference,
    events: &[PendingEvent],
) {
    for event in events {
        publisher.publish(resource_ref, event).await;
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`.
pub mod reasons {
    // DOCluster
    pub const LOAD_BALANCER_CREATED: &str = "LoadBalancerCreated";
    pub const LOAD_BALANCER_UPDATED: &str = "LoadBalancerUpdated";
    pub const LOAD_BALANCER_READY: &str = "LoadBalancerReady";
    pub const LOAD_BALANCER_DELETED: &str = "LoadBalancerDeleted";
    pub const LOAD_BALANCER_ERROR: &str = "LoadBalancerError";
    pub const DNS_RECORD_CREATED: &str = "DNSRecordCreated";
    pub const DNS_RECORD_READY: &str = "DNSRecordReady";
    pub const DNS_RECORD_DELETED: &str = "DNSRecordDeleted";

    // DOMachine
    pub const INSTANCE_CREATED: &str = "InstanceCreated";
    pub const INSTANCE_CREATING_ERROR: &str = "InstanceCreatingError";
    pub const INSTANCE_READY: &str = "InstanceReady";
    pub const INSTANCE_STATUS_ERROR: &str = "InstanceStatusError";
    pub const INSTANCE_DELETED: &str = "InstanceDeleted";
    pub const NO_INSTANCE_FOUND: &str = "NoInstanceFound";
    pub const VOLUME_DELETED: &str = "VolumeDeleted";

    // DOKS
    pub const MANAGED_CLUSTER_CREATED: &str = "ManagedClusterCreated";
    pub const MANAGED_CLUSTER_READY: &str = "ManagedClusterReady";
    pub const MANAGED_CLUSTER_DELETED: &str = "ManagedClusterDeleted";
    pub const KUBECONFIG_UPDATED: &str = "KubeconfigUpdated";
    pub const NODE_POOL_CREATED: &str = "NodePoolCreated";
    pub const NODE_POOL_SCALED: &str = "NodePoolScaled";
    pub const NODE_POOL_DELETED: &str = "NodePoolDeleted";
}

/// Event actions, shown in the ACTION column.
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const CREATE: &str = "Create";
    pub const UPDATE: &str = "Update";
    pub const DELETE: &str = "Delete";
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
