// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants shared with Cluster API.
//!
//! Cluster API establishes ownership and lifecycle signals through well-known
//! labels and annotations. Every reconciler reads these through the constants
//! defined here so the spelling lives in one place.

// ============================================================================
// Cluster API Labels
// ============================================================================

/// Label carrying the owning cluster name on every Cluster API object
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Label marking a `Machine` as part of the control plane
pub const CONTROL_PLANE_LABEL: &str = "cluster.x-k8s.io/control-plane";

// ============================================================================
// Cluster API Annotations
// ============================================================================

/// Annotation pausing reconciliation of an object or a whole cluster
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";

/// Annotation holding the serialized hub object on down-converted objects
pub const CONVERSION_DATA_ANNOTATION: &str = "cluster.x-k8s.io/conversion-data";

// ============================================================================
// Kubernetes Standard Labels
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for `app.kubernetes.io/managed-by` on objects written by this provider
pub const MANAGED_BY_CAPDO: &str = "capdo";
