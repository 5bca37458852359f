// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Admission rules for the infrastructure kinds.
//!
//! Every rule is a pure function from the new (and, on update, old) object to
//! a list of [`FieldError`]s. An empty list admits the object.
//!
//! | Kind | Create | Update |
//! |------|--------|--------|
//! | `DOCluster` | load balancer ranges | `spec.region` immutable, ranges |
//! | `DOMachine` | - | spec immutable except `providerID` and `additionalTags` |
//! | `DOMachineTemplate` | `providerID` forbidden | spec immutable, `providerID` forbidden |
//! | `DOClusterTemplate` | load balancer ranges | spec immutable |
//!
//! Zero values in the load balancer settings mean "use the default" and are
//! always accepted.

use crate::constants::{
    LB_HEALTH_CHECK_SECS_MAX, LB_HEALTH_CHECK_SECS_MIN, LB_HEALTH_CHECK_THRESHOLD_MAX,
    LB_HEALTH_CHECK_THRESHOLD_MIN, LB_PORT_MAX, LB_PORT_MIN,
};
use crate::crd::{DOCluster, DOClusterTemplate, DOLoadBalancer, DOMachine, DOMachineTemplate};
use std::fmt;

/// Category of a field error, named like the Kubernetes API server names them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldErrorType {
    Invalid,
    Forbidden,
}

impl fmt::Display for FieldErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => f.write_str("Invalid value"),
            Self::Forbidden => f.write_str("Forbidden"),
        }
    }
}

/// One rejected field.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {error_type}: {detail}")]
pub struct FieldError {
    /// Dotted path of the field, e.g. `spec.region`
    pub field: String,
    pub error_type: FieldErrorType,
    pub detail: String,
}

impl FieldError {
    #[must_use]
    pub fn invalid(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error_type: FieldErrorType::Invalid,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn forbidden(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error_type: FieldErrorType::Forbidden,
            detail: detail.into(),
        }
    }
}

/// Denial message listing every field error of an object.
///
/// Matches the API server format:
/// `DOCluster "name" is invalid: [spec.region: Invalid value: field is immutable]`
#[must_use]
pub fn aggregate(kind: &str, name: &str, errors: &[FieldError]) -> String {
    let joined = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{kind} \"{name}\" is invalid: [{joined}]")
}

fn check_range(errors: &mut Vec<FieldError>, field: &str, value: i32, min: i32, max: i32) {
    if value != 0 && !(min..=max).contains(&value) {
        errors.push(FieldError::invalid(
            field,
            format!("{value} must be between {min} and {max}"),
        ));
    }
}

/// Port and health-check ranges of a load balancer spec under `path`.
#[must_use]
pub fn validate_load_balancer(lb: &DOLoadBalancer, path: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let hc = &lb.health_check;
    check_range(&mut errors, &format!("{path}.port"), lb.port, LB_PORT_MIN, LB_PORT_MAX);
    for (name, value) in [("interval", hc.interval), ("timeout", hc.timeout)] {
        check_range(
            &mut errors,
            &format!("{path}.healthCheck.{name}"),
            value,
            LB_HEALTH_CHECK_SECS_MIN,
            LB_HEALTH_CHECK_SECS_MAX,
        );
    }
    for (name, value) in [
        ("unhealthyThreshold", hc.unhealthy_threshold),
        ("healthyThreshold", hc.healthy_threshold),
    ] {
        check_range(
            &mut errors,
            &format!("{path}.healthCheck.{name}"),
            value,
            LB_HEALTH_CHECK_THRESHOLD_MIN,
            LB_HEALTH_CHECK_THRESHOLD_MAX,
        );
    }
    errors
}

/// `DOCluster` on create (`old` is `None`) or update.
#[must_use]
pub fn validate_do_cluster(new: &DOCluster, old: Option<&DOCluster>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Some(old) = old {
        if old.spec.region != new.spec.region {
            errors.push(FieldError::invalid("spec.region", "field is immutable"));
        }
    }
    errors.extend(validate_load_balancer(
        &new.spec.network.load_balancer,
        "spec.network.loadBalancer",
    ));
    errors
}

/// `DOMachine` on create (`old` is `None`) or update.
#[must_use]
pub fn validate_do_machine(new: &DOMachine, old: Option<&DOMachine>) -> Vec<FieldError> {
    let Some(old) = old else {
        return Vec::new();
    };
    let mut old_spec = old.spec.clone();
    let mut new_spec = new.spec.clone();
    for spec in [&mut old_spec, &mut new_spec] {
        spec.provider_id = None;
        spec.additional_tags.clear();
    }
    if old_spec == new_spec {
        Vec::new()
    } else {
        vec![FieldError::forbidden("spec", "cannot be modified")]
    }
}

/// `DOMachineTemplate` on create (`old` is `None`) or update.
#[must_use]
pub fn validate_do_machine_template(
    new: &DOMachineTemplate,
    old: Option<&DOMachineTemplate>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if new.spec.template.spec.provider_id.is_some() {
        errors.push(FieldError::forbidden(
            "spec.template.spec.providerID",
            "cannot be set in templates",
        ));
    }
    if old.is_some_and(|old| old.spec != new.spec) {
        errors.push(FieldError::invalid("spec", "DOMachineTemplate spec is immutable"));
    }
    errors
}

/// `DOClusterTemplate` on create (`old` is `None`) or update.
#[must_use]
pub fn validate_do_cluster_template(
    new: &DOClusterTemplate,
    old: Option<&DOClusterTemplate>,
) -> Vec<FieldError> {
    if old.is_some_and(|old| old.spec != new.spec) {
        return vec![FieldError::invalid("spec", "DOClusterTemplate spec is immutable")];
    }
    validate_load_balancer(
        &new.spec.template.spec.network.load_balancer,
        "spec.template.spec.network.loadBalancer",
    )
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
