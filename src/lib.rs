// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # capdo - Cluster API infrastructure provider for DigitalOcean
//!
//! capdo is a Kubernetes controller written in Rust that provisions the
//! DigitalOcean infrastructure behind Cluster API clusters: API server load
//! balancers, droplets, volumes, DNS records and DOKS managed clusters.
//!
//! ## Overview
//!
//! This library provides the core functionality of the provider, including:
//!
//! - Custom Resource Definitions for the infrastructure kinds
//! - Reconciliation logic driving DigitalOcean towards the declared state
//! - Admission and conversion webhooks
//! - A DigitalOcean API client with retry and rate-limit handling
//!
//! ## Modules
//!
//! - [`crd`] - Infrastructure kinds (`DOCluster`, `DOMachine`, DOKS kinds, templates)
//! - [`capi`] - The Cluster API core types the provider reads
//! - [`cloud`] - DigitalOcean API capabilities and the HTTP client
//! - [`reconcilers`] - Reconciliation logic for each kind
//! - [`scope`] - Per-reconcile bundles of objects and cloud services
//! - [`webhook`] - Admission validation, defaulting and conversion endpoints
//! - [`conversion`] - Conversion between the served API versions
//! - [`dns`] - Propagation checks of the control plane DNS record
//! - [`context`] - Shared context for controllers
//!
//! ## Example
//!
//! ```rust,no_run
//! use capdo::crd::{APIEndpoint, DOCluster, DOClusterSpec, DONetwork};
//!
//! let cluster = DOCluster::new(
//!     "capdo-test",
//!     DOClusterSpec {
//!         region: "nyc1".to_string(),
//!         network: DONetwork::default(),
//!         control_plane_endpoint: APIEndpoint::default(),
//!         control_plane_dns: None,
//!     },
//! );
//! ```
//!
//! ## Features
//!
//! - **Idempotent** - Every reconcile finds cloud resources by ID or ownership tag first
//! - **Status Tracking** - Ready, failure reason and addresses on every kind
//! - **Managed Clusters** - DOKS clusters and node pools behind a feature flag

pub mod capi;
pub mod cloud;
pub mod config;
pub mod constants;
pub mod context;
pub mod conversion;
pub mod crd;
pub mod dns;
pub mod errors;
pub mod events;
pub mod labels;
pub mod metrics;
pub mod naming;
pub mod reconcilers;
pub mod scope;
pub mod webhook;
