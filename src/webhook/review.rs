// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Admission and conversion review handling.
//!
//! These functions turn a decoded review into the response review. They do
//! no I/O; the HTTP layer in [`super`] only decodes and encodes.

use crate::conversion::convert_objects;
use crate::webhook::validation::{aggregate, FieldError};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// `apiVersion` of conversion reviews.
pub const CONVERSION_REVIEW_API_VERSION: &str = "apiextensions.k8s.io/v1";

/// `kind` of conversion reviews.
pub const CONVERSION_REVIEW_KIND: &str = "ConversionReview";

const CONVERSION_SUCCESS: &str = "Success";
const CONVERSION_FAILURE: &str = "Failure";

/// Validate an admission review with `validate`.
///
/// Deletes and connects are always admitted. On update `validate` receives
/// the old object as well.
pub fn admit<K, F>(review: AdmissionReview<K>, validate: F) -> AdmissionReview<DynamicObject>
where
    K: Resource<DynamicType = ()>,
    F: Fn(&K, Option<&K>) -> Vec<FieldError>,
{
    let request: AdmissionRequest<K> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Failed to parse admission request");
            return AdmissionResponse::invalid(e.to_string()).into_review();
        }
    };
    let response = AdmissionResponse::from(&request);

    let Some(object) = request.object.as_ref() else {
        return response.into_review();
    };
    let old = match request.operation {
        Operation::Create => None,
        Operation::Update => request.old_object.as_ref(),
        _ => return response.into_review(),
    };

    let errors = validate(object, old);
    if errors.is_empty() {
        debug!(kind = %K::kind(&()), name = %object.name_any(), operation = ?request.operation, "Admitted");
        return response.into_review();
    }
    let message = aggregate(&K::kind(&()), &object.name_any(), &errors);
    info!(kind = %K::kind(&()), name = %object.name_any(), reason = %message, "Denied");
    response.deny(message).into_review()
}

/// Admit an object unchanged. Defaults live in the schema.
pub fn admit_unchanged(review: AdmissionReview<DynamicObject>) -> AdmissionReview<DynamicObject> {
    let request: Result<AdmissionRequest<DynamicObject>, _> = review.try_into();
    match request {
        Ok(request) => AdmissionResponse::from(&request).into_review(),
        Err(e) => {
            warn!(error = %e, "Failed to parse admission request");
            AdmissionResponse::invalid(e.to_string()).into_review()
        }
    }
}

/// `apiextensions.k8s.io/v1` `ConversionReview`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReview {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ConversionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ConversionResponse>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub uid: String,
    #[serde(rename = "desiredAPIVersion")]
    pub desired_api_version: String,
    #[serde(default)]
    pub objects: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub uid: String,
    #[serde(default)]
    pub converted_objects: Vec<Value>,
    pub result: ConversionResult,
}

/// Outcome of a conversion, shaped like a `metav1.Status`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Convert the objects of a review and build the response review.
///
/// Either every object converts or the response reports a failure and
/// carries no objects.
#[must_use]
pub fn review_conversion(review: ConversionReview) -> ConversionReview {
    let Some(request) = review.request else {
        warn!("ConversionReview without a request");
        return ConversionReview {
            api_version: CONVERSION_REVIEW_API_VERSION.to_string(),
            kind: CONVERSION_REVIEW_KIND.to_string(),
            request: None,
            response: Some(ConversionResponse {
                result: ConversionResult {
                    status: CONVERSION_FAILURE.to_string(),
                    message: "missing request".to_string(),
                },
                ..Default::default()
            }),
        };
    };

    let count = request.objects.len();
    let response = match convert_objects(request.objects, &request.desired_api_version) {
        Ok(converted_objects) => {
            debug!(uid = %request.uid, count, desired = %request.desired_api_version, "Converted objects");
            ConversionResponse {
                uid: request.uid,
                converted_objects,
                result: ConversionResult {
                    status: CONVERSION_SUCCESS.to_string(),
                    message: String::new(),
                },
            }
        }
        Err(e) => {
            warn!(uid = %request.uid, desired = %request.desired_api_version, error = %e, "Conversion failed");
            ConversionResponse {
                uid: request.uid,
                converted_objects: Vec::new(),
                result: ConversionResult {
                    status: CONVERSION_FAILURE.to_string(),
                    message: e.to_string(),
                },
            }
        }
    };

    ConversionReview {
        api_version: CONVERSION_REVIEW_API_VERSION.to_string(),
        kind: CONVERSION_REVIEW_KIND.to_string(),
        request: None,
        response: Some(response),
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod review_tests;
