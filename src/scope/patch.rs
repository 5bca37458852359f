// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deferred write-back of a reconciled object.
//!
//! A [`PatchHelper`] snapshots an object when the reconcile starts. When the
//! reconcile ends it diffs the mutated object against the snapshot and sends
//! JSON merge patches (RFC 7386) for what changed:
//!
//! 1. `status` through the status subresource
//! 2. `metadata.{labels,annotations,finalizers}` and `spec` on the main resource
//!
//! Status goes first so that releasing the last finalizer (which lets the API
//! server remove the object) never races a status write. Nothing is sent when
//! nothing changed.

use crate::errors::ReconcileError;
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt::Debug;
use tracing::debug;

/// Merge patches computed by [`PatchHelper::diff`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchSet {
    /// Patch of metadata and spec, `None` when unchanged.
    pub object: Option<Value>,
    /// Patch of the status subresource, `None` when unchanged.
    pub status: Option<Value>,
}

impl PatchSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object.is_none() && self.status.is_none()
    }
}

/// Snapshot of an object taken at the start of a reconcile.
#[derive(Clone, Debug)]
pub struct PatchHelper {
    name: String,
    object: Value,
    status: Value,
}

impl PatchHelper {
    /// Capture the current state of `resource`.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be serialized.
    pub fn new<K>(resource: &K) -> Result<Self, ReconcileError>
    where
        K: Resource + Serialize,
    {
        let value = serde_json::to_value(resource)?;
        Ok(Self {
            name: resource.meta().name.clone().unwrap_or_default(),
            object: patchable_object(&value),
            status: patchable_status(&value),
        })
    }

    /// Merge patches that turn the snapshot into `resource`.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be serialized.
    pub fn diff<K>(&self, resource: &K) -> Result<PatchSet, ReconcileError>
    where
        K: Resource + Serialize,
    {
        let value = serde_json::to_value(resource)?;
        Ok(PatchSet {
            object: merge_diff(&self.object, &patchable_object(&value)),
            status: merge_diff(&self.status, &patchable_status(&value)),
        })
    }

    /// Write the changes made to `resource` since the snapshot.
    ///
    /// A 404 means the object is already gone (typically because the last
    /// finalizer was released) and is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or an API call fails.
    pub async fn patch<K>(&self, api: &Api<K>, resource: &K) -> Result<(), ReconcileError>
    where
        K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned,
    {
        let patches = self.diff(resource)?;
        if patches.is_empty() {
            debug!(kind = %K::kind(&()), name = %self.name, "Nothing to patch");
            return Ok(());
        }

        let params = PatchParams::default();
        if let Some(status) = &patches.status {
            debug!(kind = %K::kind(&()), name = %resource.name_any(), patch = %status, "Patching status");
            match api
                .patch_status(&self.name, &params, &Patch::Merge(status))
                .await
            {
                Ok(_) => {}
                Err(kube::Error::Api(e)) if e.code == 404 => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(object) = &patches.object {
            debug!(kind = %K::kind(&()), name = %resource.name_any(), patch = %object, "Patching object");
            match api.patch(&self.name, &params, &Patch::Merge(object)).await {
                Ok(_) => {}
                Err(kube::Error::Api(e)) if e.code == 404 => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn patchable_object(value: &Value) -> Value {
    let metadata = value.get("metadata");
    let field = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    };
    json!({
        "metadata": {
            "labels": field("labels"),
            "annotations": field("annotations"),
            "finalizers": field("finalizers"),
        },
        "spec": value.get("spec").cloned().unwrap_or(Value::Null),
    })
}

fn patchable_status(value: &Value) -> Value {
    json!({ "status": value.get("status").cloned().unwrap_or(Value::Null) })
}

/// RFC 7386 merge patch from `before` to `after`, `None` if they are equal.
///
/// Objects are diffed key by key, removed keys become `null`, and every other
/// value (arrays included) is replaced wholesale.
#[must_use]
pub fn merge_diff(before: &Value, after: &Value) -> Option<Value> {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            let mut patch = Map::new();
            for (key, new_value) in new {
                match old.get(key) {
                    Some(old_value) => {
                        if let Some(change) = merge_diff(old_value, new_value) {
                            patch.insert(key.clone(), change);
                        }
                    }
                    None if new_value.is_null() => {}
                    None => {
                        patch.insert(key.clone(), new_value.clone());
                    }
                }
            }
            for key in old.keys() {
                if !new.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        _ if before == after => None,
        _ => Some(after.clone()),
    }
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod patch_tests;
