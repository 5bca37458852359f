// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for provider resources.
//!
//! Finalizers are edited on the in-memory object held by the reconcile scope;
//! the [`PatchHelper`](crate::scope::PatchHelper) writes the change back
//! together with the rest of the reconcile's edits. A finalizer therefore
//! reaches the API server only if the reconcile that added it also flushed.
//!
//! Lifecycle of a guarded object:
//!
//! ```text
//! absent ──add──▶ present ──deletionTimestamp──▶ deleting ──cloud gone──▶ released
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use capdo::constants::FINALIZER_DO_CLUSTER;
//! use capdo::reconcilers::finalizers::{add_finalizer, remove_finalizer};
//!
//! add_finalizer(&mut do_cluster, FINALIZER_DO_CLUSTER);
//! // ... cloud deletion confirmed ...
//! remove_finalizer(&mut do_cluster, FINALIZER_DO_CLUSTER);
//! ```

use kube::{Resource, ResourceExt};
use tracing::info;

/// Whether `finalizer` is present on the resource.
#[must_use]
pub fn has_finalizer<K: Resource>(resource: &K, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Add `finalizer` if missing. Returns `true` when the object changed.
pub fn add_finalizer<K>(resource: &mut K, finalizer: &str) -> bool
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    if has_finalizer(resource, finalizer) {
        return false;
    }

    info!(
        kind = %K::kind(&()),
        namespace = %resource.namespace().unwrap_or_default(),
        name = %resource.name_any(),
        finalizer = finalizer,
        "Adding finalizer"
    );
    resource
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Remove `finalizer` if present. Returns `true` when the object changed.
///
/// Callers must only release the finalizer once the guarded cloud objects are
/// confirmed gone.
pub fn remove_finalizer<K>(resource: &mut K, finalizer: &str) -> bool
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    if !has_finalizer(resource, finalizer) {
        return false;
    }

    info!(
        kind = %K::kind(&()),
        namespace = %resource.namespace().unwrap_or_default(),
        name = %resource.name_any(),
        finalizer = finalizer,
        "Removing finalizer"
    );
    if let Some(finalizers) = resource.meta_mut().finalizers.as_mut() {
        finalizers.retain(|f| f != finalizer);
    }
    true
}

/// Whether the resource is being deleted.
#[must_use]
pub fn is_deleting<K: Resource>(resource: &K) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
