// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `validation.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{
        DOClusterTemplateResource, DOClusterTemplateSpec, DOMachineTemplateResource,
        DOMachineTemplateSpec,
    };
    use crate::reconcilers::test_fixtures::{do_cluster, do_machine};

    fn machine_template() -> DOMachineTemplate {
        DOMachineTemplate::new(
            "workers",
            DOMachineTemplateSpec {
                template: DOMachineTemplateResource {
                    spec: do_machine("unused").spec,
                },
            },
        )
    }

    fn cluster_template() -> DOClusterTemplate {
        DOClusterTemplate::new(
            "cluster-class",
            DOClusterTemplateSpec {
                template: DOClusterTemplateResource {
                    spec: do_cluster().spec,
                },
            },
        )
    }

    #[test]
    fn test_cluster_create_accepts_defaults() {
        assert!(validate_do_cluster(&do_cluster(), None).is_empty());
    }

    #[test]
    fn test_cluster_region_is_immutable() {
        let old = do_cluster();
        let mut new = old.clone();
        new.spec.region = "ams3".to_string();

        let errors = validate_do_cluster(&new, Some(&old));

        assert_eq!(
            errors,
            vec![FieldError::invalid("spec.region", "field is immutable")]
        );
    }

    #[test]
    fn test_cluster_other_fields_may_change() {
        let old = do_cluster();
        let mut new = old.clone();
        new.spec.network.load_balancer.port = 8443;

        assert!(validate_do_cluster(&new, Some(&old)).is_empty());
    }

    #[test]
    fn test_load_balancer_ranges() {
        let mut lb = DOLoadBalancer::default();
        assert!(validate_load_balancer(&lb, "lb").is_empty());

        lb.port = 70000;
        lb.health_check.interval = 2;
        lb.health_check.timeout = 300;
        lb.health_check.unhealthy_threshold = 11;
        lb.health_check.healthy_threshold = 2;

        let fields: Vec<String> = validate_load_balancer(&lb, "lb")
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "lb.port",
                "lb.healthCheck.interval",
                "lb.healthCheck.unhealthyThreshold"
            ]
        );
    }

    #[test]
    fn test_machine_provider_id_and_tags_may_change() {
        let old = do_machine("capdo-test-md-0");
        let mut new = old.clone();
        new.spec.provider_id = Some("digitalocean://42".to_string());
        new.spec.additional_tags = vec!["team:infra".to_string()];

        assert!(validate_do_machine(&new, Some(&old)).is_empty());
    }

    #[test]
    fn test_machine_size_cannot_change() {
        let old = do_machine("capdo-test-md-0");
        let mut new = old.clone();
        new.spec.size = "s-4vcpu-8gb".to_string();

        let errors = validate_do_machine(&new, Some(&old));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "spec");
        assert_eq!(errors[0].error_type, FieldErrorType::Forbidden);
    }

    #[test]
    fn test_machine_create_is_admitted() {
        assert!(validate_do_machine(&do_machine("capdo-test-md-0"), None).is_empty());
    }

    #[test]
    fn test_machine_template_forbids_provider_id() {
        let mut template = machine_template();
        template.spec.template.spec.provider_id = Some("digitalocean://1".to_string());

        let errors = validate_do_machine_template(&template, None);

        assert_eq!(errors[0].field, "spec.template.spec.providerID");
        assert_eq!(errors[0].error_type, FieldErrorType::Forbidden);
    }

    #[test]
    fn test_machine_template_spec_is_immutable() {
        let old = machine_template();
        let mut new = old.clone();
        new.spec.template.spec.additional_tags = vec!["extra".to_string()];

        let errors = validate_do_machine_template(&new, Some(&old));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "spec");
    }

    #[test]
    fn test_cluster_template_spec_is_immutable() {
        let old = cluster_template();
        let mut new = old.clone();
        new.spec.template.spec.region = "sfo3".to_string();

        assert_eq!(validate_do_cluster_template(&new, Some(&old)).len(), 1);
        assert!(validate_do_cluster_template(&old, Some(&old)).is_empty());
    }

    #[test]
    fn test_aggregate_message() {
        let message = aggregate(
            "DOCluster",
            "capdo-test",
            &[
                FieldError::invalid("spec.region", "field is immutable"),
                FieldError::forbidden("spec", "cannot be modified"),
            ],
        );

        assert_eq!(
            message,
            "DOCluster \"capdo-test\" is invalid: [spec.region: Invalid value: field is immutable, spec: Forbidden: cannot be modified]"
        );
    }
}
