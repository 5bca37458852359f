// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation error type.
//!
//! Reconcilers return [`ReconcileError`]. The controller error policy uses
//! [`ReconcileError::is_throttled`] to choose between a jittered requeue and
//! exponential backoff, and [`ReconcileError::metric_label`] to label the
//! error counter.

use crate::cloud::CloudError;
use crate::dns::DnsError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A DigitalOcean API call failed.
    #[error("{operation}: {source}")]
    Cloud {
        /// What the reconciler was doing, e.g. `creating droplet`
        operation: String,
        #[source]
        source: CloudError,
    },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("DNS propagation check failed: {0}")]
    Dns(#[from] DnsError),

    /// Retrying cannot help; recorded in `failureReason`/`failureMessage`.
    #[error("{reason}: {message}")]
    Terminal {
        reason: &'static str,
        message: String,
    },

    /// A prerequisite is missing; retried with backoff.
    #[error("{0}")]
    Precondition(String),

    #[error("reconcile did not finish within {0:?}")]
    Timeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ReconcileError {
    /// Whether the cloud API is rate limiting us.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Cloud { source, .. } if source.is_throttled())
    }

    /// Whether the error ends up in the object's failure fields.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }

    /// Label for the `errors_total` metric.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Cloud { source, .. } => match source {
                CloudError::NotFound { .. } => "cloud_not_found",
                CloudError::RateLimited { .. } => "cloud_throttled",
                CloudError::Transport(_) => "cloud_transport",
                CloudError::Decode(_) => "cloud_decode",
                CloudError::Api { status, .. } if *status >= 500 => "cloud_server",
                CloudError::Api { status: 429, .. } => "cloud_throttled",
                CloudError::Api { .. } => "cloud_client",
            },
            Self::Kube(_) => "kube_api",
            Self::Dns(_) => "dns",
            Self::Terminal { .. } => "terminal",
            Self::Precondition(_) => "precondition",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

/// Attach the operation being performed to a cloud error.
pub trait CloudResultExt<T> {
    /// # Errors
    ///
    /// Wraps the cloud error as [`ReconcileError::Cloud`].
    fn during(self, operation: impl Into<String>) -> Result<T, ReconcileError>;
}

impl<T> CloudResultExt<T> for Result<T, CloudError> {
    fn during(self, operation: impl Into<String>) -> Result<T, ReconcileError> {
        self.map_err(|source| ReconcileError::Cloud {
            operation: operation.into(),
            source,
        })
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
