// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `control_plane.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::cloud::fake::FakeCloud;
    use crate::crd::{DOKSCluster, DOKSClusterStatus};
    use crate::reconcilers::test_fixtures::{
        cluster, doks_cluster, doks_control_plane, CLUSTER_NAME, NAMESPACE,
    };

    const CLUSTER_ID: &str = "doks-1";
    const KUBECONFIG: &[u8] = b"apiVersion: v1\nkind: Config\n";

    fn running_cluster() -> DOKSCluster {
        let mut doks = doks_cluster();
        doks.status = Some(DOKSClusterStatus {
            ready: true,
            cluster_id: Some(CLUSTER_ID.to_string()),
            state: Some("running".to_string()),
            ..Default::default()
        });
        doks
    }

    fn scope(cloud: &Arc<FakeCloud>, doks: Option<DOKSCluster>) -> ControlPlaneScope {
        ControlPlaneScope::new(cluster(true), doks_control_plane(), doks, cloud.services())
    }

    fn seed_kubeconfig(cloud: &FakeCloud, value: &[u8]) {
        cloud
            .state()
            .kubeconfigs
            .insert(CLUSTER_ID.to_string(), value.to_vec());
    }

    #[tokio::test]
    async fn test_waits_for_managed_cluster() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, Some(doks_cluster()));

        let outcome = reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        assert_eq!(outcome, Outcome::requeue_secs(DOKS_PENDING_REQUEUE_SECS));
        assert!(scope.kubeconfig_secret.is_none());
        assert_eq!(cloud.state().count("kubernetes.kubeconfig"), 0);
        let status = scope.control_plane.status.as_ref().expect("status set");
        assert!(!status.initialized);
        assert!(!status.ready);
        assert!(status.external_managed_control_plane);
    }

    #[tokio::test]
    async fn test_waits_without_doks_cluster() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, None);

        let outcome = reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        assert!(outcome.is_requeue());
        assert_eq!(
            scope
                .control_plane
                .status
                .as_ref()
                .and_then(|s| s.version.as_deref()),
            Some("1.31.1-do.0")
        );
    }

    #[tokio::test]
    async fn test_writes_kubeconfig_secret() {
        let cloud = FakeCloud::new();
        seed_kubeconfig(&cloud, KUBECONFIG);
        let mut scope = scope(&cloud, Some(running_cluster()));

        let outcome = reconcile_normal(&mut scope).await.expect("reconcile succeeds");

        assert_eq!(outcome, Outcome::Done);
        let secret = scope.kubeconfig_secret.as_ref().expect("secret built");
        assert_eq!(secret.metadata.name.as_deref(), Some(CLUSTER_NAME));
        assert_eq!(secret.metadata.namespace.as_deref(), Some(NAMESPACE));
        assert_eq!(secret.type_.as_deref(), Some(KUBECONFIG_SECRET_TYPE));
        assert_eq!(
            secret
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(CLUSTER_NAME_LABEL))
                .map(String::as_str),
            Some(CLUSTER_NAME)
        );
        let owners = secret.metadata.owner_references.as_ref().expect("owner set");
        assert_eq!(owners[0].kind, "DOKSControlPlane");
        assert_eq!(owners[0].uid, "cp-uid");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(current_kubeconfig(Some(secret)), Some(KUBECONFIG));

        let status = scope.control_plane.status.as_ref().expect("status set");
        assert!(status.initialized);
        assert!(status.ready);
        assert_eq!(scope.events[0].reason, reasons::KUBECONFIG_UPDATED);
    }

    #[tokio::test]
    async fn test_unchanged_kubeconfig_is_left_alone() {
        let cloud = FakeCloud::new();
        seed_kubeconfig(&cloud, KUBECONFIG);
        let mut first = scope(&cloud, Some(running_cluster()));
        reconcile_normal(&mut first).await.expect("first pass");
        let existing = first.kubeconfig_secret.clone();

        let mut second =
            scope(&cloud, Some(running_cluster())).with_kubeconfig_secret(existing.clone());
        reconcile_normal(&mut second).await.expect("second pass");

        assert_eq!(second.kubeconfig_secret, existing);
        assert!(second.events.is_empty());
    }

    #[tokio::test]
    async fn test_rotated_kubeconfig_is_rewritten() {
        let cloud = FakeCloud::new();
        seed_kubeconfig(&cloud, KUBECONFIG);
        let mut first = scope(&cloud, Some(running_cluster()));
        reconcile_normal(&mut first).await.expect("first pass");
        seed_kubeconfig(&cloud, b"apiVersion: v1\nkind: Config\n# rotated\n");

        let mut second =
            scope(&cloud, Some(running_cluster())).with_kubeconfig_secret(first.kubeconfig_secret);
        reconcile_normal(&mut second).await.expect("second pass");

        assert_eq!(
            current_kubeconfig(second.kubeconfig_secret.as_ref()),
            Some(&b"apiVersion: v1\nkind: Config\n# rotated\n"[..])
        );
        assert_eq!(second.events.len(), 1);
    }

    #[tokio::test]
    async fn test_kubeconfig_download_failure_is_an_error() {
        let cloud = FakeCloud::new();
        let mut scope = scope(&cloud, Some(running_cluster()));

        let err = reconcile_normal(&mut scope).await.expect_err("download fails");

        assert!(matches!(err, ReconcileError::Cloud { .. }));
        assert!(!scope
            .control_plane
            .status
            .as_ref()
            .is_some_and(|s| s.initialized));
    }
}
