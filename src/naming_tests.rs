// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `naming.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_do_safe_name_replaces_dots_and_slashes() {
        assert_eq!(do_safe_name("my.cluster/prod"), "my-cluster-prod");
        assert_eq!(do_safe_name("plain"), "plain");
    }

    #[test]
    fn test_do_safe_name_is_idempotent() {
        for name in ["a.b.c", "x/y", "already-safe", "", "..//"] {
            let once = do_safe_name(name);
            assert_eq!(do_safe_name(&once), once, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn test_build_tags_order() {
        let additional = vec!["team:infra".to_string(), "env:dev".to_string()];
        let tags = build_tags(&TagParams {
            cluster_name: "capdo.test",
            cluster_uid: "1234-abcd",
            role: ResourceRole::ApiServer,
            name: "capdo-test-control-plane-nkkxn",
            additional: &additional,
        });

        assert_eq!(
            tags,
            vec![
                "sigs-k8s-io:capdo:capdo-test",
                "sigs-k8s-io:capdo:capdo-test:apiserver",
                "sigs-k8s-io:capdo:capdo-test:1234-abcd:apiserver",
                "name:capdo-test-control-plane-nkkxn",
                "team:infra",
                "env:dev",
            ]
        );
    }

    #[test]
    fn test_build_tags_is_pure() {
        let params = TagParams {
            cluster_name: "c",
            cluster_uid: "u",
            role: ResourceRole::Node,
            name: "m.1",
            additional: &[],
        };
        assert_eq!(build_tags(&params), build_tags(&params));
    }

    #[test]
    fn test_tags_contain_no_unsafe_characters() {
        let tags = build_tags(&TagParams {
            cluster_name: "a.b/c",
            cluster_uid: "uid",
            role: ResourceRole::Node,
            name: "d.e/f",
            additional: &[],
        });
        for tag in tags {
            assert!(!tag.contains('.') && !tag.contains('/'), "unsafe tag {tag}");
        }
    }

    #[test]
    fn test_load_balancer_name() {
        assert_eq!(
            load_balancer_name("my.cluster", "uid-1"),
            "my-cluster-apiserver-uid-1"
        );
    }

    #[test]
    fn test_data_disk_volume_name() {
        assert_eq!(
            data_disk_volume_name("capdo-test-control-plane-nkkxn", "etcd"),
            "capdo-test-control-plane-nkkxn-etcd"
        );
        assert_eq!(data_disk_volume_name("m.1", "data"), "m-1-data");
    }

    #[test]
    fn test_provider_id_round_trip() {
        let id = provider_id(12345);
        assert_eq!(id, "digitalocean://12345");
        assert_eq!(parse_droplet_id(&id), Ok(12345));
    }

    #[test]
    fn test_parse_droplet_id_rejects_malformed_values() {
        assert_eq!(
            parse_droplet_id("aws:///i-123"),
            Err(ProviderIdError::MissingScheme("aws:///i-123".into()))
        );
        assert_eq!(
            parse_droplet_id("digitalocean://"),
            Err(ProviderIdError::EmptyId("digitalocean://".into()))
        );
        assert_eq!(
            parse_droplet_id("digitalocean://12a"),
            Err(ProviderIdError::NotNumeric("digitalocean://12a".into()))
        );
        assert!(parse_droplet_id("digitalocean://+12").is_err());
    }

    #[test]
    fn test_parse_provider_id_accepts_uuid() {
        let uuid = "9bc5ba3e-1c7e-4d5b-8a2a-0d2a5cfc2b7f";
        assert_eq!(parse_provider_id(&provider_id(uuid)), Ok(uuid));
    }
}
