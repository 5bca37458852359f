// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-reconcile state carriers.
//!
//! A scope bundles the object being reconciled with its owners and peers, the
//! cloud services, and the events queued during the reconcile. Reconcilers
//! mutate the objects inside the scope; the controller wrapper writes them
//! back through a [`PatchHelper`] snapshot taken before the reconcile.
//!
//! Scopes hold no Kubernetes client, so every reconcile branch runs against
//! the in-memory fake cloud in unit tests.

pub mod cluster;
pub mod doks;
pub mod machine;
pub mod patch;

pub use cluster::ClusterScope;
pub use doks::{ControlPlaneScope, ManagedClusterScope, NodePoolScope};
pub use machine::MachineScope;
pub use patch::{PatchHelper, PatchSet};
