// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `scope/patch.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::FINALIZER_DO_CLUSTER;
    use crate::crd::{DOCluster, DOClusterSpec, DOClusterStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn cluster() -> DOCluster {
        DOCluster {
            metadata: ObjectMeta {
                name: Some("capdo-test".to_string()),
                namespace: Some("default".to_string()),
                resource_version: Some("42".to_string()),
                ..Default::default()
            },
            spec: DOClusterSpec {
                region: "nyc1".to_string(),
                network: Default::default(),
                control_plane_endpoint: Default::default(),
                control_plane_dns: None,
            },
            status: None,
        }
    }

    #[test]
    fn test_merge_diff_equal_values() {
        let value = json!({"a": 1, "b": {"c": [1, 2]}});
        assert_eq!(merge_diff(&value, &value), None);
    }

    #[test]
    fn test_merge_diff_nested_changes_and_removals() {
        let before = json!({"a": 1, "b": {"c": "x", "d": "y"}, "e": [1, 2]});
        let after = json!({"a": 1, "b": {"c": "z"}, "e": [1, 2, 3], "f": true});

        assert_eq!(
            merge_diff(&before, &after),
            Some(json!({"b": {"c": "z", "d": null}, "e": [1, 2, 3], "f": true}))
        );
    }

    #[test]
    fn test_merge_diff_ignores_new_null_keys() {
        let before = json!({"a": 1});
        let after = json!({"a": 1, "b": null});
        assert_eq!(merge_diff(&before, &after), None);
    }

    #[test]
    fn test_untouched_object_produces_no_patch() {
        let obj = cluster();
        let helper = PatchHelper::new(&obj).expect("snapshot");

        let patches = helper.diff(&obj).expect("diff");
        assert!(patches.is_empty());
    }

    #[test]
    fn test_status_and_finalizer_changes_are_split() {
        let mut obj = cluster();
        let helper = PatchHelper::new(&obj).expect("snapshot");

        obj.metadata.finalizers = Some(vec![FINALIZER_DO_CLUSTER.to_string()]);
        obj.spec.network.load_balancer.port = 6443;
        obj.status = Some(DOClusterStatus {
            ready: true,
            ..Default::default()
        });

        let patches = helper.diff(&obj).expect("diff");
        assert_eq!(
            patches.object,
            Some(json!({
                "metadata": {"finalizers": [FINALIZER_DO_CLUSTER]},
                "spec": {"network": {"loadBalancer": {"port": 6443}}}
            }))
        );
        assert_eq!(
            patches.status,
            Some(json!({
                "status": {
                    "ready": true,
                    "controlPlaneDNSRecordReady": false,
                    "network": {"loadBalancerRef": {}}
                }
            }))
        );
    }

    #[test]
    fn test_metadata_outside_patchable_fields_is_ignored() {
        let mut obj = cluster();
        let helper = PatchHelper::new(&obj).expect("snapshot");

        obj.metadata.resource_version = Some("43".to_string());
        obj.metadata.generation = Some(7);

        assert!(helper.diff(&obj).expect("diff").is_empty());
    }

    #[test]
    fn test_cleared_failure_fields_become_null() {
        let mut obj = cluster();
        obj.status = Some(DOClusterStatus {
            failure_reason: Some("CreateError".to_string()),
            ..Default::default()
        });
        let helper = PatchHelper::new(&obj).expect("snapshot");

        if let Some(status) = obj.status.as_mut() {
            status.failure_reason = None;
        }

        let patches = helper.diff(&obj).expect("diff");
        assert_eq!(
            patches.status,
            Some(json!({"status": {"failureReason": null}}))
        );
        assert_eq!(patches.object, None);
    }

    #[test]
    fn test_label_removal() {
        let mut obj = cluster();
        obj.metadata.labels = Some(BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]));
        let helper = PatchHelper::new(&obj).expect("snapshot");

        if let Some(labels) = obj.metadata.labels.as_mut() {
            labels.remove("b");
        }

        let patches = helper.diff(&obj).expect("diff");
        assert_eq!(
            patches.object,
            Some(json!({"metadata": {"labels": {"b": null}}}))
        );
    }
}
