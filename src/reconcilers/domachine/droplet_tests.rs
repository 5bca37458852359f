// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `droplet.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::cloud::fake::FakeCloud;
    use crate::cloud::types::{Image, Region, Volume};
    use crate::reconcilers::test_fixtures::{
        cluster, data_disk, do_cluster, do_machine, machine, REGION,
    };
    use std::sync::Arc;

    const MACHINE: &str = "capdo-test-cp-0";

    fn scope(cloud: &Arc<FakeCloud>, image: IntOrString) -> MachineScope {
        cloud.state().images.push(Image {
            id: 7,
            name: "Debian 12".to_string(),
            slug: Some("debian-12-x64".to_string()),
            distribution: "Debian".to_string(),
        });
        let mut do_machine = do_machine(MACHINE);
        do_machine.spec.image = image;
        do_machine.spec.ssh_keys = Vec::new();
        MachineScope::new(
            cluster(true),
            machine(MACHINE, true),
            do_cluster(),
            do_machine,
            cloud.services(),
        )
    }

    #[tokio::test]
    async fn test_create_refuses_missing_volume() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, IntOrString::Int(7));
        scope.do_machine.spec.data_disks = vec![data_disk("etcd", 10), data_disk("data", 20)];
        cloud.state().volumes.push(Volume {
            id: "vol-etcd".to_string(),
            name: format!("{MACHINE}-etcd"),
            region: Region {
                slug: REGION.to_string(),
            },
            size_gigabytes: 10,
            ..Default::default()
        });

        let err = create(&mut scope, "userdata").await.expect_err("create fails");

        assert!(matches!(err, ReconcileError::Precondition(_)));
        assert_eq!(
            err.to_string(),
            format!("volume \"{MACHINE}-data\" does not exist")
        );
        assert_eq!(cloud.state().count("droplets.create"), 0);
    }

    #[tokio::test]
    async fn test_volume_in_other_region_does_not_count() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, IntOrString::Int(7));
        scope.do_machine.spec.data_disks = vec![data_disk("etcd", 10)];
        cloud.state().volumes.push(Volume {
            id: "vol-elsewhere".to_string(),
            name: format!("{MACHINE}-etcd"),
            region: Region {
                slug: "ams3".to_string(),
            },
            ..Default::default()
        });

        let err = create(&mut scope, "userdata").await.expect_err("create fails");

        assert!(matches!(err, ReconcileError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_image_resolved_by_slug() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, IntOrString::String("debian-12-x64".to_string()));

        create(&mut scope, "userdata").await.expect("create succeeds");

        let state = cloud.state();
        assert_eq!(state.count("images.get_by_slug"), 1);
        assert_eq!(state.droplet_requests[0].image, DropletCreateImage::Id(7));
    }

    #[tokio::test]
    async fn test_image_resolved_by_numeric_string() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, IntOrString::String("7".to_string()));

        create(&mut scope, "userdata").await.expect("create succeeds");

        let state = cloud.state();
        assert_eq!(state.count("images.get"), 1);
        assert_eq!(state.count("images.get_by_slug"), 0);
    }

    #[tokio::test]
    async fn test_zero_image_is_terminal() {
        for image in [IntOrString::Int(0), IntOrString::String("0".to_string())] {
            let cloud = FakeCloud::new();
            let mut scope = scope(&cloud, image);

            let err = create(&mut scope, "userdata").await.expect_err("create fails");

            assert!(err.is_terminal());
            assert!(err.to_string().contains("unable to get image"));
            assert!(cloud.state().calls.iter().all(|c| !c.starts_with("images.")));
        }
    }

    #[tokio::test]
    async fn test_unknown_ssh_key_fingerprint_is_terminal() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, IntOrString::Int(7));
        scope.do_machine.spec.ssh_keys = vec![IntOrString::String("aa:bb".to_string())];

        let err = create(&mut scope, "userdata").await.expect_err("create fails");

        assert!(err.is_terminal());
        assert_eq!(cloud.state().count("keys.get_by_fingerprint"), 1);
    }

    #[tokio::test]
    async fn test_create_sets_provider_id_and_status() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, IntOrString::Int(7));

        let droplet = create(&mut scope, "userdata").await.expect("create succeeds");

        assert_eq!(
            scope.do_machine.spec.provider_id,
            Some(format!("digitalocean://{}", droplet.id))
        );
        assert_eq!(
            scope.do_machine.status.as_ref().and_then(|s| s.instance_status),
            Some(DOResourceStatus::New)
        );
    }

    #[tokio::test]
    async fn test_find_matches_name_among_tagged_droplets() {
        let cloud = FakeCloud::new();
        let scope = scope(&cloud, IntOrString::Int(7));
        let tag = scope.ownership_tag();
        {
            let mut state = cloud.state();
            for (id, name) in [(1, "capdo-test-cp-1"), (2, MACHINE)] {
                state.droplets.insert(
                    id,
                    Droplet {
                        id,
                        name: name.to_string(),
                        status: "active".to_string(),
                        tags: vec![tag.clone()],
                        ..Default::default()
                    },
                );
            }
        }

        let found = find(&scope, None).await.expect("lookup succeeds");

        assert_eq!(found.map(|d| d.id), Some(2));
    }
}
