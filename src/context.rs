// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every controller receives an `Arc<Context>` that contains:
//! - Kubernetes client
//! - DigitalOcean cloud services
//! - DNS propagation checker for control plane records
//! - Event publisher
//! - Requeue settings and the per-object error backoff

use crate::cloud::CloudServices;
use crate::constants::{DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_SYNC_PERIOD_SECS};
use crate::dns::PropagationChecker;
use crate::events::EventPublisher;
use crate::reconcilers::retry::ErrorBackoff;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// DigitalOcean API capabilities
    pub cloud: CloudServices,

    /// `None` when no resolver could be configured; DOClusters with a
    /// control plane DNS record then fail until one is.
    pub dns: Option<Arc<PropagationChecker>>,

    pub events: Arc<dyn EventPublisher>,

    pub settings: ReconcileSettings,

    /// Consecutive failure counts per object, for the error policy
    pub backoff: Arc<ErrorBackoff>,
}

/// Timing knobs shared by every controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Requeue interval of converged objects
    pub sync_period: Duration,
    /// Upper bound of a single reconcile
    pub reconcile_timeout: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            sync_period: Duration::from_secs(DEFAULT_SYNC_PERIOD_SECS),
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("dns", &self.dns)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
