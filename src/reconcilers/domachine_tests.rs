// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `domachine.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::cloud::fake::FakeCloud;
    use crate::cloud::types::{
        DropletCreateImage, DropletCreateSshKey, Image, Key, NetworkV4, Networks, Region, Volume,
    };
    use crate::cloud::CloudError;
    use crate::reconcilers::finalizers::has_finalizer;
    use crate::reconcilers::test_fixtures::{
        cluster, data_disk, deleting, do_cluster, do_machine, machine, CLUSTER_UID, REGION,
    };
    use std::time::Duration;

    const MACHINE: &str = "capdo-test-md-0-x7k2p";
    const USER_DATA: &str = "#cloud-config\nruncmd: []\n";

    fn seed(cloud: &FakeCloud) {
        let mut state = cloud.state();
        state.images.push(Image {
            id: 42,
            name: "Ubuntu 22.04".to_string(),
            slug: Some("ubuntu-22-04-x64".to_string()),
            distribution: "Ubuntu".to_string(),
        });
        state.keys.push(Key {
            id: 1234,
            fingerprint: "3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa".to_string(),
            public_key: "ssh-ed25519 AAAAC3Nza existing".to_string(),
            name: "ops".to_string(),
        });
    }

    fn scope_for(cloud: &Arc<FakeCloud>, do_machine: DOMachine) -> MachineScope {
        seed(cloud);
        MachineScope::new(
            cluster(true),
            machine(MACHINE, false),
            do_cluster(),
            do_machine,
            cloud.services(),
        )
        .with_bootstrap_data(Some(USER_DATA.to_string()))
    }

    fn scope(cloud: &Arc<FakeCloud>) -> MachineScope {
        scope_for(cloud, do_machine(MACHINE))
    }

    fn node_tags() -> Vec<String> {
        vec![
            "sigs-k8s-io:capdo:capdo-test".to_string(),
            "sigs-k8s-io:capdo:capdo-test:node".to_string(),
            format!("sigs-k8s-io:capdo:capdo-test:{CLUSTER_UID}:node"),
            format!("name:{MACHINE}"),
        ]
    }

    fn activate(cloud: &FakeCloud, id: u64) {
        let mut state = cloud.state();
        let droplet = state.droplets.get_mut(&id).expect("droplet exists");
        droplet.status = "active".to_string();
        droplet.networks = Networks {
            v4: vec![
                NetworkV4 {
                    ip_address: "10.10.0.5".to_string(),
                    network_type: "private".to_string(),
                },
                NetworkV4 {
                    ip_address: "203.0.113.20".to_string(),
                    network_type: "public".to_string(),
                },
            ],
        };
    }

    fn only_droplet_id(cloud: &FakeCloud) -> u64 {
        let state = cloud.state();
        assert_eq!(state.droplets.len(), 1);
        *state.droplets.keys().next().expect("one droplet")
    }

    fn status(scope: &MachineScope) -> &crate::crd::DOMachineStatus {
        scope.do_machine.status.as_ref().expect("status set")
    }

    #[tokio::test]
    async fn test_creates_droplet_and_records_provider_id() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);

        let outcome = reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        assert_eq!(outcome, Outcome::RequeueAfter(Duration::from_secs(10)));
        assert!(has_finalizer(&scope.do_machine, FINALIZER_DO_MACHINE));

        let id = only_droplet_id(&cloud);
        assert_eq!(
            scope.do_machine.spec.provider_id.as_deref(),
            Some(format!("digitalocean://{id}").as_str())
        );
        assert_eq!(status(&scope).instance_status, Some(DOResourceStatus::New));
        assert!(!status(&scope).ready);

        let state = cloud.state();
        assert_eq!(state.count("droplets.create"), 1);
        let request = &state.droplet_requests[0];
        assert_eq!(request.name, MACHINE);
        assert_eq!(request.region, REGION);
        assert_eq!(request.size, "s-2vcpu-2gb");
        assert_eq!(request.image, DropletCreateImage::Id(42));
        assert_eq!(
            request.ssh_keys,
            vec![DropletCreateSshKey {
                id: 1234,
                fingerprint: "3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa".to_string(),
            }]
        );
        assert!(request.private_networking);
        assert_eq!(request.user_data, USER_DATA);
        assert_eq!(request.tags, node_tags());
        assert!(request.volumes.is_empty());
        drop(state);

        assert_eq!(scope.events.len(), 1);
        assert_eq!(scope.events[0].reason, reasons::INSTANCE_CREATED);
    }

    #[tokio::test]
    async fn test_control_plane_machine_uses_apiserver_role() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        scope.machine = machine(MACHINE, true);

        reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        let state = cloud.state();
        assert!(state.droplet_requests[0]
            .tags
            .contains(&format!("sigs-k8s-io:capdo:capdo-test:{CLUSTER_UID}:apiserver")));
    }

    #[tokio::test]
    async fn test_ready_with_addresses_once_droplet_is_active() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        reconcile_normal(&mut scope).await.expect("first reconcile");
        activate(&cloud, only_droplet_id(&cloud));

        let outcome = reconcile_normal(&mut scope).await.expect("second reconcile");

        assert_eq!(outcome, Outcome::Done);
        let status = status(&scope);
        assert!(status.ready);
        assert_eq!(status.instance_status, Some(DOResourceStatus::Active));
        assert_eq!(
            status.addresses,
            vec![
                MachineAddress {
                    address_type: MachineAddressType::InternalIp,
                    address: "10.10.0.5".to_string(),
                },
                MachineAddress {
                    address_type: MachineAddressType::ExternalIp,
                    address: "203.0.113.20".to_string(),
                },
            ]
        );
        assert_eq!(cloud.state().count("droplets.create"), 1);
        assert!(scope
            .events
            .iter()
            .any(|e| e.reason == reasons::INSTANCE_READY));
    }

    #[tokio::test]
    async fn test_converged_machine_issues_no_mutations() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        reconcile_normal(&mut scope).await.expect("first reconcile");
        activate(&cloud, only_droplet_id(&cloud));
        reconcile_normal(&mut scope).await.expect("second reconcile");
        let mutations_before = cloud.state().mutations.len();
        scope.events.clear();
        let snapshot = scope.do_machine.clone();

        let outcome = reconcile_normal(&mut scope).await.expect("third reconcile");

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(cloud.state().mutations.len(), mutations_before);
        assert!(scope.events.is_empty());
        assert_eq!(scope.do_machine, snapshot);
    }

    #[tokio::test]
    async fn test_waits_for_cluster_infrastructure() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        scope.cluster = cluster(false);

        let outcome = reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        assert_eq!(outcome, Outcome::Done);
        assert!(cloud.state().calls.is_empty());
        assert!(has_finalizer(&scope.do_machine, FINALIZER_DO_MACHINE));
    }

    #[tokio::test]
    async fn test_waits_for_bootstrap_data() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud).with_bootstrap_data(None);

        let outcome = reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        assert_eq!(outcome, Outcome::Done);
        assert!(cloud.state().calls.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_create_is_terminal() {
        let cloud = FakeCloud::new();
        cloud.fail(
            "droplets.create",
            CloudError::Api {
                status: 422,
                id: "unprocessable_entity".to_string(),
                message: "Region is not available".to_string(),
            },
        );
        let mut scope = scope(&cloud);

        let outcome = reconcile_normal(&mut scope).await.expect("terminal is recorded");

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(status(&scope).failure_reason.as_deref(), Some("CreateMachineError"));
        assert!(status(&scope)
            .failure_message
            .as_deref()
            .is_some_and(|m| m.contains("Region is not available")));
        assert!(scope
            .events
            .iter()
            .any(|e| e.reason == reasons::INSTANCE_CREATING_ERROR));

        // A failed machine is left alone.
        cloud.clear_failures();
        let calls_before = cloud.state().calls.len();
        reconcile_normal(&mut scope).await.expect("reconcile succeeds");
        assert_eq!(cloud.state().calls.len(), calls_before);
    }

    #[tokio::test]
    async fn test_unknown_image_is_terminal() {
        let cloud = FakeCloud::new();
        let mut machine = do_machine(MACHINE);
        machine.spec.image = k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::String(
            "no-such-image".to_string(),
        );
        let mut scope = scope_for(&cloud, machine);

        reconcile_normal(&mut scope).await.expect("terminal is recorded");

        assert_eq!(status(&scope).failure_reason.as_deref(), Some("CreateMachineError"));
        assert_eq!(cloud.state().count("droplets.create"), 0);
    }

    #[tokio::test]
    async fn test_server_error_on_create_is_retried() {
        let cloud = FakeCloud::new();
        cloud.fail(
            "droplets.create",
            CloudError::Api {
                status: 503,
                id: "service_unavailable".to_string(),
                message: "try again".to_string(),
            },
        );
        let mut scope = scope(&cloud);

        let err = reconcile_normal(&mut scope).await.expect_err("reconcile fails");

        assert!(matches!(err, ReconcileError::Cloud { .. }));
        assert!(!scope.has_failed());
    }

    #[tokio::test]
    async fn test_unexpected_droplet_status_is_terminal() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        reconcile_normal(&mut scope).await.expect("first reconcile");
        let id = only_droplet_id(&cloud);
        cloud
            .state()
            .droplets
            .get_mut(&id)
            .expect("droplet exists")
            .status = "off".to_string();

        let outcome = reconcile_normal(&mut scope).await.expect("terminal is recorded");

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(status(&scope).failure_reason.as_deref(), Some("UpdateMachineError"));
        assert_eq!(status(&scope).instance_status, Some(DOResourceStatus::Off));
        assert!(scope
            .events
            .iter()
            .any(|e| e.reason == reasons::INSTANCE_STATUS_ERROR));
    }

    #[tokio::test]
    async fn test_malformed_provider_id_is_terminal() {
        let cloud = FakeCloud::new();
        let mut machine = do_machine(MACHINE);
        machine.spec.provider_id = Some("aws:///i-123".to_string());
        let mut scope = scope_for(&cloud, machine);

        reconcile_normal(&mut scope).await.expect("terminal is recorded");

        assert_eq!(status(&scope).failure_reason.as_deref(), Some("UpdateMachineError"));
        assert_eq!(cloud.state().count("droplets.create"), 0);
    }

    fn seed_volume(cloud: &FakeCloud, name: &str) -> String {
        let mut state = cloud.state();
        let id = format!("vol-{name}");
        state.volumes.push(Volume {
            id: id.clone(),
            name: name.to_string(),
            region: Region {
                slug: REGION.to_string(),
            },
            size_gigabytes: 256,
            ..Default::default()
        });
        id
    }

    #[tokio::test]
    async fn test_missing_data_disk_volume_fails_before_droplet_create() {
        let cloud = FakeCloud::new();
        let mut machine = do_machine(MACHINE);
        machine.spec.data_disks = vec![data_disk("etcd", 256)];
        let mut scope = scope_for(&cloud, machine);

        let err = reconcile_normal(&mut scope)
            .await
            .expect_err("missing volume fails the reconcile");

        assert!(matches!(err, ReconcileError::Precondition(_)));
        assert_eq!(
            err.to_string(),
            format!("volume \"{MACHINE}-etcd\" does not exist")
        );
        let state = cloud.state();
        assert_eq!(state.count("volumes.create"), 0);
        assert_eq!(state.count("droplets.create"), 0);
        drop(state);
        assert!(scope.do_machine.spec.provider_id.is_none());
    }

    #[tokio::test]
    async fn test_existing_data_disk_volumes_are_attached() {
        let cloud = FakeCloud::new();
        let etcd = seed_volume(&cloud, &format!("{MACHINE}-etcd"));
        let data = seed_volume(&cloud, &format!("{MACHINE}-data"));
        let mut machine = do_machine(MACHINE);
        machine.spec.data_disks = vec![data_disk("etcd", 256), data_disk("data", 256)];
        let mut scope = scope_for(&cloud, machine);

        reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        let state = cloud.state();
        assert_eq!(state.count("volumes.create"), 0);
        assert_eq!(state.droplet_requests[0].volumes, vec![etcd, data]);
    }

    #[tokio::test]
    async fn test_dotted_machine_name_is_made_safe_for_droplet() {
        let cloud = FakeCloud::new();
        let mut first = scope_for(&cloud, do_machine("worker.a"));

        reconcile_normal(&mut first).await.expect("reconcile succeeds");

        {
            let state = cloud.state();
            assert_eq!(state.droplet_requests[0].name, "worker-a");
            assert!(state.droplet_requests[0]
                .tags
                .contains(&"name:worker-a".to_string()));
        }

        // Without a provider ID the droplet is found again by its safe name.
        let mut again = scope_for(&cloud, do_machine("worker.a"));
        reconcile_normal(&mut again).await.expect("reconcile succeeds");

        assert_eq!(cloud.state().count("droplets.create"), 1);
        assert_eq!(
            again.do_machine.spec.provider_id,
            first.do_machine.spec.provider_id
        );
    }

    #[tokio::test]
    async fn test_ssh_public_key_uploaded_once() {
        let cloud = FakeCloud::new();
        let public_key = Some("ssh-ed25519 AAAAC3Nza fresh\n".to_string());
        let mut first = do_machine(MACHINE);
        first.spec.ssh_public_key = public_key.clone();
        let mut scope = scope_for(&cloud, first);

        reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        {
            let state = cloud.state();
            assert_eq!(state.count("keys.create"), 1);
            assert_eq!(state.key_requests[0].public_key, "ssh-ed25519 AAAAC3Nza fresh");
            assert_eq!(state.droplet_requests[0].ssh_keys.len(), 2);
        }

        // Another machine with the same key reuses the uploaded one.
        let mut other = MachineScope::new(
            cluster(true),
            machine("capdo-test-md-0-abcde", false),
            do_cluster(),
            {
                let mut m = do_machine("capdo-test-md-0-abcde");
                m.spec.ssh_public_key = public_key;
                m
            },
            cloud.services(),
        )
        .with_bootstrap_data(Some(USER_DATA.to_string()));
        reconcile_normal(&mut other).await.expect("reconcile succeeds");

        assert_eq!(cloud.state().count("keys.create"), 1);
    }

    #[tokio::test]
    async fn test_retags_droplet() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        reconcile_normal(&mut scope).await.expect("first reconcile");
        let id = only_droplet_id(&cloud);
        activate(&cloud, id);
        scope.do_machine.spec.additional_tags = vec!["team-a".to_string()];
        cloud
            .state()
            .droplets
            .get_mut(&id)
            .expect("droplet exists")
            .tags
            .push("stale".to_string());

        reconcile_normal(&mut scope).await.expect("second reconcile");

        let state = cloud.state();
        assert_eq!(state.count("tags.create"), 1);
        assert!(state.tags.contains("team-a"));
        assert_eq!(state.count("tags.tag_resources"), 1);
        assert_eq!(state.count("tags.untag_resources"), 1);
        let mut expected = node_tags();
        expected.push("team-a".to_string());
        assert_eq!(state.droplets[&id].tags, expected);
    }

    #[tokio::test]
    async fn test_adopts_droplet_found_by_tag() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        reconcile_normal(&mut scope).await.expect("first reconcile");
        let id = only_droplet_id(&cloud);
        // The providerID write was lost.
        scope.do_machine.spec.provider_id = None;

        reconcile_normal(&mut scope).await.expect("second reconcile");

        assert_eq!(cloud.state().count("droplets.create"), 1);
        assert_eq!(
            scope.do_machine.spec.provider_id.as_deref(),
            Some(format!("digitalocean://{id}").as_str())
        );
    }

    #[tokio::test]
    async fn test_delete_without_data_disks_releases_finalizer() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        reconcile_normal(&mut scope).await.expect("create");
        deleting(&mut scope.do_machine.metadata);
        scope.events.clear();

        let outcome = reconcile_delete(&mut scope).await.expect("delete succeeds");

        assert_eq!(outcome, Outcome::Done);
        assert!(cloud.state().droplets.is_empty());
        assert!(!has_finalizer(&scope.do_machine, FINALIZER_DO_MACHINE));
        assert_eq!(scope.events[0].reason, reasons::INSTANCE_DELETED);
    }

    #[tokio::test]
    async fn test_delete_with_data_disks_waits_then_removes_volumes() {
        let cloud = FakeCloud::new();
        let mut machine = do_machine(MACHINE);
        machine.spec.data_disks = vec![data_disk("etcd", 10)];
        let mut scope = scope_for(&cloud, machine);
        reconcile_normal(&mut scope).await.expect("create");
        deleting(&mut scope.do_machine.metadata);

        let outcome = reconcile_delete(&mut scope).await.expect("first delete pass");

        assert_eq!(outcome, Outcome::RequeueAfter(Duration::from_secs(10)));
        assert!(cloud.state().droplets.is_empty());
        assert_eq!(cloud.state().volumes.len(), 1);
        assert!(has_finalizer(&scope.do_machine, FINALIZER_DO_MACHINE));

        let outcome = reconcile_delete(&mut scope).await.expect("second delete pass");

        assert_eq!(outcome, Outcome::Done);
        assert!(cloud.state().volumes.is_empty());
        assert!(!has_finalizer(&scope.do_machine, FINALIZER_DO_MACHINE));
        assert!(scope
            .events
            .iter()
            .any(|e| e.reason == reasons::VOLUME_DELETED));
    }

    #[tokio::test]
    async fn test_delete_tolerates_droplet_already_gone() {
        let cloud = FakeCloud::new();
        let mut machine = do_machine(MACHINE);
        machine.spec.provider_id = Some("digitalocean://999".to_string());
        machine.metadata.finalizers = Some(vec![FINALIZER_DO_MACHINE.to_string()]);
        let mut scope = scope_for(&cloud, machine);
        deleting(&mut scope.do_machine.metadata);

        let outcome = reconcile_delete(&mut scope).await.expect("delete succeeds");

        assert_eq!(outcome, Outcome::Done);
        assert!(!has_finalizer(&scope.do_machine, FINALIZER_DO_MACHINE));
        assert!(cloud.state().mutations.is_empty());
        assert_eq!(scope.events[0].reason, reasons::NO_INSTANCE_FOUND);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_finalizer() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud);
        reconcile_normal(&mut scope).await.expect("create");
        cloud.fail(
            "droplets.delete",
            CloudError::Transport("connection reset".to_string()),
        );

        let err = reconcile_delete(&mut scope).await.expect_err("delete fails");

        assert!(matches!(err, ReconcileError::Cloud { .. }));
        assert!(has_finalizer(&scope.do_machine, FINALIZER_DO_MACHINE));
    }
}
