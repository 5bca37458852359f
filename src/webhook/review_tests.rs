// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `review.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{DOCluster, DOMachine};
    use crate::reconcilers::test_fixtures::{do_cluster, do_machine};
    use crate::webhook::validation::{validate_do_cluster, validate_do_machine};
    use serde_json::json;

    fn admission_review<K: Serialize>(
        kind: &str,
        operation: &str,
        object: Option<&K>,
        old_object: Option<&K>,
    ) -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "infrastructure.cluster.x-k8s.io", "version": "v1beta1", "kind": kind},
                "resource": {"group": "infrastructure.cluster.x-k8s.io", "version": "v1beta1", "resource": format!("{}s", kind.to_lowercase())},
                "name": "capdo-test",
                "namespace": "default",
                "operation": operation,
                "userInfo": {"username": "admin"},
                "object": object.map(|o| serde_json::to_value(o).expect("serializable")),
                "oldObject": old_object.map(|o| serde_json::to_value(o).expect("serializable")),
                "dryRun": false
            }
        })
    }

    fn response_of(review: &AdmissionReview<DynamicObject>) -> &AdmissionResponse {
        review.response.as_ref().expect("response set")
    }

    #[test]
    fn test_admits_valid_update() {
        let old = do_cluster();
        let body = admission_review("DOCluster", "UPDATE", Some(&old), Some(&old));
        let review: AdmissionReview<DOCluster> =
            serde_json::from_value(body).expect("valid review");

        let result = admit(review, validate_do_cluster);

        let response = response_of(&result);
        assert!(response.allowed);
        assert_eq!(response.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
    }

    #[test]
    fn test_denies_region_change_with_field_path() {
        let old = do_cluster();
        let mut new = old.clone();
        new.spec.region = "ams3".to_string();
        let body = admission_review("DOCluster", "UPDATE", Some(&new), Some(&old));
        let review: AdmissionReview<DOCluster> =
            serde_json::from_value(body).expect("valid review");

        let result = admit(review, validate_do_cluster);

        let response = response_of(&result);
        assert!(!response.allowed);
        assert!(response.result.message.contains("spec.region"));
        assert!(response.result.message.contains("field is immutable"));
    }

    #[test]
    fn test_create_ignores_old_object_rules() {
        let new = do_machine("capdo-test-md-0");
        let body = admission_review::<DOMachine>("DOMachine", "CREATE", Some(&new), None);
        let review: AdmissionReview<DOMachine> =
            serde_json::from_value(body).expect("valid review");

        assert!(response_of(&admit(review, validate_do_machine)).allowed);
    }

    #[test]
    fn test_delete_is_admitted() {
        let old = do_machine("capdo-test-md-0");
        let body = admission_review::<DOMachine>("DOMachine", "DELETE", None, Some(&old));
        let review: AdmissionReview<DOMachine> =
            serde_json::from_value(body).expect("valid review");

        assert!(response_of(&admit(review, validate_do_machine)).allowed);
    }

    #[test]
    fn test_admit_unchanged_has_no_patch() {
        let object = do_cluster();
        let body = admission_review("DOCluster", "CREATE", Some(&object), None);
        let review: AdmissionReview<DynamicObject> =
            serde_json::from_value(body).expect("valid review");

        let result = admit_unchanged(review);

        let response = response_of(&result);
        assert!(response.allowed);
        assert!(response.patch.is_none());
    }

    #[test]
    fn test_conversion_review_round_trip_shape() {
        let body = json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "ConversionReview",
            "request": {
                "uid": "conv-1",
                "desiredAPIVersion": "infrastructure.cluster.x-k8s.io/v1beta1",
                "objects": [serde_json::to_value(do_cluster()).expect("serializable")]
            }
        });
        let review: ConversionReview = serde_json::from_value(body).expect("valid review");

        let result = review_conversion(review);

        let response = result.response.expect("response set");
        assert_eq!(result.api_version, CONVERSION_REVIEW_API_VERSION);
        assert_eq!(result.kind, CONVERSION_REVIEW_KIND);
        assert_eq!(response.uid, "conv-1");
        assert_eq!(response.result.status, "Success");
        assert_eq!(response.converted_objects.len(), 1);
        assert_eq!(
            response.converted_objects[0]["apiVersion"],
            "infrastructure.cluster.x-k8s.io/v1beta1"
        );
    }

    #[test]
    fn test_conversion_failure_reports_message() {
        let review = ConversionReview {
            api_version: CONVERSION_REVIEW_API_VERSION.to_string(),
            kind: CONVERSION_REVIEW_KIND.to_string(),
            request: Some(ConversionRequest {
                uid: "conv-2".to_string(),
                desired_api_version: "infrastructure.cluster.x-k8s.io/v1alpha4".to_string(),
                objects: vec![json!({"metadata": {"name": "broken"}})],
            }),
            response: None,
        };

        let response = review_conversion(review).response.expect("response set");

        assert_eq!(response.uid, "conv-2");
        assert_eq!(response.result.status, "Failure");
        assert!(response.result.message.contains("apiVersion"));
        assert!(response.converted_objects.is_empty());
    }

    #[test]
    fn test_conversion_review_serializes_camel_case() {
        let review = review_conversion(ConversionReview {
            request: Some(ConversionRequest {
                uid: "conv-3".to_string(),
                desired_api_version: "infrastructure.cluster.x-k8s.io/v1beta1".to_string(),
                objects: Vec::new(),
            }),
            ..Default::default()
        });

        let value = serde_json::to_value(&review).expect("serializable");

        assert_eq!(value["response"]["uid"], "conv-3");
        assert_eq!(value["response"]["convertedObjects"], json!([]));
        assert_eq!(value["response"]["result"]["status"], "Success");
        assert!(value.get("request").is_none());
    }
}
