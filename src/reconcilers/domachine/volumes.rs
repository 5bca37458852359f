// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Data-disk volumes of a `DOMachine`.
//!
//! Each data disk is a block volume named `safe({machine}-{suffix})` in the
//! cluster region. Volumes are provisioned outside the provider and must
//! exist before the droplet is created, which attaches them.

use crate::cloud::types::Volume;
use crate::crd::DataDisk;
use crate::errors::{CloudResultExt, ReconcileError};
use crate::events::{actions, reasons, PendingEvent};
use crate::metrics;
use crate::naming::data_disk_volume_name;
use crate::scope::MachineScope;
use tracing::{debug, info};

fn volume_name(scope: &MachineScope, disk: &DataDisk) -> String {
    data_disk_volume_name(&scope.name(), &disk.name_suffix)
}

/// Volume of each data disk, `None` where it does not exist.
///
/// # Errors
///
/// Returns an error if listing volumes fails.
pub async fn lookup(scope: &MachineScope) -> Result<Vec<(String, Option<Volume>)>, ReconcileError> {
    let mut found = Vec::with_capacity(scope.do_machine.spec.data_disks.len());
    for disk in &scope.do_machine.spec.data_disks {
        let name = volume_name(scope, disk);
        let volume = scope
            .cloud
            .storage
            .list_by_name(&name, scope.region())
            .await
            .during(format!("listing volume {name}"))?
            .into_iter()
            .next();
        found.push((name, volume));
    }
    Ok(found)
}

/// Delete the data-disk volumes that still exist. Returns how many went.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails for a reason other than 404.
pub async fn delete(scope: &mut MachineScope) -> Result<usize, ReconcileError> {
    let mut deleted = 0;
    for (name, volume) in lookup(scope).await? {
        let Some(volume) = volume else {
            debug!(volume = %name, "Data disk volume already gone");
            continue;
        };
        match scope.cloud.storage.delete(&volume.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e).during(format!("deleting volume {name}")),
        }
        info!(volume = %name, volume_id = %volume.id, "Deleted data disk volume");
        metrics::record_resource_deleted("volume");
        scope.record(PendingEvent::normal(
            reasons::VOLUME_DELETED,
            actions::DELETE,
            format!("Deleted volume {name}"),
        ));
        deleted += 1;
    }
    Ok(deleted)
}
