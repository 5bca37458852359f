// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTPS admission and conversion webhook server.
//!
//! Paths follow the Cluster API provider convention
//! `/{validate,mutate}-{group with dashes}-{version}-{kind}` so the generated
//! webhook configurations work unchanged:
//!
//! - `/validate-*` - [`validation`] rules through [`review::admit`]
//! - `/mutate-*` - defaulting, which admits objects unchanged
//! - `/convert` - `ConversionReview` for the multi-version CRDs
//!
//! The serving certificate is read from the certificate directory and
//! reloaded whenever the files change, so cert-manager rotations need no
//! restart.

pub mod review;
pub mod validation;

use crate::constants::CERT_WATCH_INTERVAL_SECS;
use crate::crd::{DOCluster, DOClusterTemplate, DOMachine, DOMachineTemplate};
use anyhow::{Context as _, Result};
use axum::routing::post;
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::admission::AdmissionReview;
use kube::core::DynamicObject;
use review::{admit, admit_unchanged, review_conversion, ConversionReview};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const PATH_PREFIX: &str = "infrastructure-cluster-x-k8s-io-v1beta1";

/// Kinds served by the admission webhooks.
const KINDS: [&str; 4] = ["docluster", "domachine", "domachinetemplate", "doclustertemplate"];

/// `/validate-...` path of a kind.
#[must_use]
pub fn validate_path(kind: &str) -> String {
    format!("/validate-{PATH_PREFIX}-{kind}")
}

/// `/mutate-...` path of a kind.
#[must_use]
pub fn mutate_path(kind: &str) -> String {
    format!("/mutate-{PATH_PREFIX}-{kind}")
}

async fn validate_do_cluster(
    Json(review): Json<AdmissionReview<DOCluster>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit(review, validation::validate_do_cluster))
}

async fn validate_do_machine(
    Json(review): Json<AdmissionReview<DOMachine>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit(review, validation::validate_do_machine))
}

async fn validate_do_machine_template(
    Json(review): Json<AdmissionReview<DOMachineTemplate>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit(review, validation::validate_do_machine_template))
}

async fn validate_do_cluster_template(
    Json(review): Json<AdmissionReview<DOClusterTemplate>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit(review, validation::validate_do_cluster_template))
}

async fn mutate(
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(admit_unchanged(review))
}

async fn convert(Json(review): Json<ConversionReview>) -> Json<ConversionReview> {
    Json(review_conversion(review))
}

/// Router with every webhook endpoint.
pub fn router() -> Router {
    let mut router = Router::new()
        .route(&validate_path(KINDS[0]), post(validate_do_cluster))
        .route(&validate_path(KINDS[1]), post(validate_do_machine))
        .route(&validate_path(KINDS[2]), post(validate_do_machine_template))
        .route(&validate_path(KINDS[3]), post(validate_do_cluster_template))
        .route("/convert", post(convert));
    for kind in KINDS {
        router = router.route(&mutate_path(kind), post(mutate));
    }
    router
}

/// Modification times of the certificate and key, `None` if either is unreadable.
async fn modified(cert: &Path, key: &Path) -> Option<(SystemTime, SystemTime)> {
    let cert = tokio::fs::metadata(cert).await.ok()?.modified().ok()?;
    let key = tokio::fs::metadata(key).await.ok()?.modified().ok()?;
    Some((cert, key))
}

/// Reload `tls` whenever the certificate or key changes on disk.
async fn watch_certificates(tls: RustlsConfig, cert: PathBuf, key: PathBuf) {
    let mut last = modified(&cert, &key).await;
    let mut interval = tokio::time::interval(Duration::from_secs(CERT_WATCH_INTERVAL_SECS));
    loop {
        interval.tick().await;
        let current = modified(&cert, &key).await;
        if current.is_none() || current == last {
            continue;
        }
        match tls.reload_from_pem_file(&cert, &key).await {
            Ok(()) => {
                info!(cert = %cert.display(), "Reloaded webhook serving certificate");
                last = current;
            }
            Err(e) => {
                warn!(cert = %cert.display(), error = %e, "Failed to reload webhook serving certificate");
            }
        }
    }
}

/// Serve the webhooks over TLS until the process stops.
///
/// # Errors
///
/// Returns an error if the certificate cannot be loaded or the listener fails.
pub async fn serve(addr: SocketAddr, cert_dir: &Path, cert_name: &str, key_name: &str) -> Result<()> {
    let cert = cert_dir.join(cert_name);
    let key = cert_dir.join(key_name);
    let tls = RustlsConfig::from_pem_file(&cert, &key)
        .await
        .with_context(|| format!("failed to load webhook certificate from {}", cert_dir.display()))?;

    tokio::spawn(watch_certificates(tls.clone(), cert, key));

    info!(addr = %addr, "Starting webhook server");
    debug!(paths = ?KINDS.map(validate_path), "Serving admission webhooks");
    axum_server::bind_rustls(addr, tls)
        .serve(router().into_make_service())
        .await
        .context("webhook server failed")?;
    Ok(())
}
