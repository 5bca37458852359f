// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Conversion between served API versions.
//!
//! `v1beta1` ([`crate::crd`]) is the hub. Every older version converts to and
//! from the hub; conversions between two spokes go through it. Fields a spoke
//! cannot represent survive a round trip in the
//! `cluster.x-k8s.io/conversion-data` annotation: down-conversion stores the
//! hub object (without metadata) as compact JSON, up-conversion restores the
//! unmapped fields from it and drops the annotation.

pub mod v1alpha3;
pub mod v1alpha4;

use crate::constants::{
    API_GROUP, API_VERSION, KIND_DO_CLUSTER, KIND_DO_CLUSTER_TEMPLATE, KIND_DO_MACHINE,
    KIND_DO_MACHINE_TEMPLATE,
};
use crate::crd;
use crate::labels::CONVERSION_DATA_ANNOTATION;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while converting objects between versions.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("malformed cluster.x-k8s.io/conversion-data annotation: {0}")]
    MalformedAnnotation(String),

    #[error("object is missing {0}")]
    MissingField(&'static str),

    #[error("cannot convert {kind} from {from} to {to}")]
    Unsupported {
        kind: String,
        from: String,
        to: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A spoke version that converts losslessly to and from the hub.
pub trait Convertible: Sized {
    type Hub;

    /// Up-convert, restoring unmapped fields from the conversion annotation.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion annotation cannot be decoded.
    fn to_hub(&self) -> Result<Self::Hub, ConversionError>;

    /// Down-convert, preserving unmapped fields in the conversion annotation.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub object cannot be serialized.
    fn from_hub(hub: &Self::Hub) -> Result<Self, ConversionError>;
}

/// Store `src` (minus metadata) in the conversion annotation of `dst`.
///
/// # Errors
///
/// Returns an error if `src` cannot be serialized.
pub fn marshal_data<T: Serialize>(src: &T, dst: &mut ObjectMeta) -> Result<(), ConversionError> {
    let mut value = serde_json::to_value(src)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("metadata");
    }
    let data = serde_json::to_string(&value)?;
    dst.annotations
        .get_or_insert_with(Default::default)
        .insert(CONVERSION_DATA_ANNOTATION.to_string(), data);
    Ok(())
}

/// Remove the conversion annotation from `meta` and decode it.
///
/// Returns `Ok(None)` when the annotation is absent.
///
/// # Errors
///
/// Returns [`ConversionError::MalformedAnnotation`] when the payload does not
/// decode into `T`.
pub fn unmarshal_data<T: DeserializeOwned>(
    meta: &mut ObjectMeta,
) -> Result<Option<T>, ConversionError> {
    let Some(annotations) = meta.annotations.as_mut() else {
        return Ok(None);
    };
    let Some(data) = annotations.remove(CONVERSION_DATA_ANNOTATION) else {
        return Ok(None);
    };
    if annotations.is_empty() {
        meta.annotations = None;
    }

    let mut value: Value = serde_json::from_str(&data)
        .map_err(|e| ConversionError::MalformedAnnotation(e.to_string()))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| ConversionError::MalformedAnnotation("not a JSON object".to_string()))?;
    object.insert("metadata".to_string(), Value::Object(Default::default()));

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ConversionError::MalformedAnnotation(e.to_string()))
}

fn hub_version() -> String {
    format!("{API_GROUP}/{API_VERSION}")
}

fn unsupported(kind: &str, from: &str, to: &str) -> ConversionError {
    ConversionError::Unsupported {
        kind: kind.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn up<S>(object: Value) -> Result<Value, ConversionError>
where
    S: Convertible + DeserializeOwned,
    S::Hub: Serialize,
{
    let spoke: S = serde_json::from_value(object)?;
    Ok(serde_json::to_value(spoke.to_hub()?)?)
}

fn down<S>(hub: Value) -> Result<Value, ConversionError>
where
    S: Convertible + Serialize,
    S::Hub: DeserializeOwned,
{
    let hub: S::Hub = serde_json::from_value(hub)?;
    Ok(serde_json::to_value(S::from_hub(&hub)?)?)
}

fn to_hub_value(kind: &str, api_version: &str, object: Value) -> Result<Value, ConversionError> {
    let version = api_version.rsplit('/').next().unwrap_or_default();
    match (kind, version) {
        (_, API_VERSION) => Ok(object),
        (KIND_DO_CLUSTER, "v1alpha3") => up::<v1alpha3::DOCluster>(object),
        (KIND_DO_MACHINE, "v1alpha3") => up::<v1alpha3::DOMachine>(object),
        (KIND_DO_MACHINE_TEMPLATE, "v1alpha3") => up::<v1alpha3::DOMachineTemplate>(object),
        (KIND_DO_CLUSTER, "v1alpha4") => up::<v1alpha4::DOCluster>(object),
        (KIND_DO_MACHINE, "v1alpha4") => up::<v1alpha4::DOMachine>(object),
        (KIND_DO_MACHINE_TEMPLATE, "v1alpha4") => up::<v1alpha4::DOMachineTemplate>(object),
        (KIND_DO_CLUSTER_TEMPLATE, "v1alpha4") => up::<v1alpha4::DOClusterTemplate>(object),
        _ => Err(unsupported(kind, api_version, &hub_version())),
    }
}

fn from_hub_value(kind: &str, api_version: &str, hub: Value) -> Result<Value, ConversionError> {
    let version = api_version.rsplit('/').next().unwrap_or_default();
    match (kind, version) {
        (_, API_VERSION) => Ok(hub),
        (KIND_DO_CLUSTER, "v1alpha3") => down::<v1alpha3::DOCluster>(hub),
        (KIND_DO_MACHINE, "v1alpha3") => down::<v1alpha3::DOMachine>(hub),
        (KIND_DO_MACHINE_TEMPLATE, "v1alpha3") => down::<v1alpha3::DOMachineTemplate>(hub),
        (KIND_DO_CLUSTER, "v1alpha4") => down::<v1alpha4::DOCluster>(hub),
        (KIND_DO_MACHINE, "v1alpha4") => down::<v1alpha4::DOMachine>(hub),
        (KIND_DO_MACHINE_TEMPLATE, "v1alpha4") => down::<v1alpha4::DOMachineTemplate>(hub),
        (KIND_DO_CLUSTER_TEMPLATE, "v1alpha4") => down::<v1alpha4::DOClusterTemplate>(hub),
        _ => Err(unsupported(kind, &hub_version(), api_version)),
    }
}

/// Convert a single object to `desired_api_version`.
///
/// # Errors
///
/// Returns an error for unknown kinds or versions, undecodable objects and
/// malformed conversion annotations.
pub fn convert_object(object: Value, desired_api_version: &str) -> Result<Value, ConversionError> {
    let api_version = object
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or(ConversionError::MissingField("apiVersion"))?
        .to_string();
    let kind = object
        .get("kind")
        .and_then(Value::as_str)
        .ok_or(ConversionError::MissingField("kind"))?
        .to_string();

    if api_version == desired_api_version {
        return Ok(object);
    }
    if !desired_api_version.starts_with(&format!("{API_GROUP}/")) {
        return Err(unsupported(&kind, &api_version, desired_api_version));
    }

    let hub = to_hub_value(&kind, &api_version, object)?;
    from_hub_value(&kind, desired_api_version, hub)
}

/// Convert every object of a list, stopping at the first failure.
///
/// # Errors
///
/// Returns the first conversion error.
pub fn convert_objects(
    objects: Vec<Value>,
    desired_api_version: &str,
) -> Result<Vec<Value>, ConversionError> {
    objects
        .into_iter()
        .map(|object| convert_object(object, desired_api_version))
        .collect()
}

/// Copy machine spec fields a spoke cannot hold back from the preserved hub.
fn restore_machine_spec(dst: &mut crd::DOMachineSpec, restored: crd::DOMachineSpec, data_disks: bool) {
    if data_disks {
        dst.data_disks = restored.data_disks;
    }
    dst.ssh_public_key = restored.ssh_public_key;
}
