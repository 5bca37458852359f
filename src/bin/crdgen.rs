// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from Rust types defined in src/crd.rs
//! and the older API versions in src/conversion/.
//! This ensures the YAML files in deploy/crds/ are always in sync with the Rust code.
//!
//! Usage:
//!   cargo run --bin crdgen
//!
//! Generated files will be written to deploy/crds/ with proper headers.

use capdo::conversion::{v1alpha3, v1alpha4};
use capdo::crd::{
    DOCluster, DOClusterTemplate, DOKSCluster, DOKSControlPlane, DOKSNodePool, DOMachine,
    DOMachineTemplate,
};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::core::crd::merge_crds;
use kube::CustomResourceExt;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

/// Version whose objects are persisted in etcd
const STORAGE_VERSION: &str = "v1beta1";

/// Service fronting the webhook server, as named in deploy/
const WEBHOOK_SERVICE: &str = "capdo-webhook-service";
const WEBHOOK_NAMESPACE: &str = "capdo-system";

type BoxError = Box<dyn std::error::Error>;

fn main() -> Result<(), BoxError> {
    let output_dir = Path::new("deploy/crds");

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    let merged = |crds: Vec<CustomResourceDefinition>| merge_crds(crds, STORAGE_VERSION);

    generate_crd(
        merged(vec![
            v1alpha3::DOCluster::crd(),
            v1alpha4::DOCluster::crd(),
            DOCluster::crd(),
        ])?,
        "doclusters.crd.yaml",
        output_dir,
    )?;
    generate_crd(
        merged(vec![
            v1alpha3::DOMachine::crd(),
            v1alpha4::DOMachine::crd(),
            DOMachine::crd(),
        ])?,
        "domachines.crd.yaml",
        output_dir,
    )?;
    generate_crd(
        merged(vec![
            v1alpha3::DOMachineTemplate::crd(),
            v1alpha4::DOMachineTemplate::crd(),
            DOMachineTemplate::crd(),
        ])?,
        "domachinetemplates.crd.yaml",
        output_dir,
    )?;
    generate_crd(
        merged(vec![v1alpha4::DOClusterTemplate::crd(), DOClusterTemplate::crd()])?,
        "doclustertemplates.crd.yaml",
        output_dir,
    )?;
    generate_crd(DOKSCluster::crd(), "doksclusters.crd.yaml", output_dir)?;
    generate_crd(DOKSControlPlane::crd(), "dokscontrolplanes.crd.yaml", output_dir)?;
    generate_crd(DOKSNodePool::crd(), "doksnodepools.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd(
    crd: CustomResourceDefinition,
    filename: &str,
    output_dir: &Path,
) -> Result<(), BoxError> {
    // Convert CRD to JSON for manipulation
    let mut crd_json: Value = serde_json::to_value(&crd)?;

    let versions: Vec<String> = crd
        .spec
        .versions
        .iter()
        .map(|v| v.name.clone())
        .collect();

    // Cluster API discovers provider versions through this label
    crd_json["metadata"]["labels"]["cluster.x-k8s.io/v1beta1"] = Value::String(versions.join("_"));

    // Older versions are converted by the webhook server
    if versions.len() > 1 {
        crd_json["spec"]["conversion"] = json!({
            "strategy": "Webhook",
            "webhook": {
                "conversionReviewVersions": ["v1"],
                "clientConfig": {
                    "service": {
                        "name": WEBHOOK_SERVICE,
                        "namespace": WEBHOOK_NAMESPACE,
                        "path": "/convert"
                    }
                }
            }
        });
    }

    // Convert back to YAML
    let yaml = serde_yaml::to_string(&crd_json)?;

    // Add copyright header
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename} ({})", versions.join(", "));

    Ok(())
}
