// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Droplet lookup and creation for a `DOMachine`.

use crate::cloud::types::{
    Droplet, DropletCreateImage, DropletCreateRequest, DropletCreateSshKey, KeyCreateRequest,
};
use crate::cloud::CloudError;
use crate::crd::DOResourceStatus;
use crate::errors::{CloudResultExt, ReconcileError};
use crate::events::{actions, reasons, PendingEvent};
use crate::metrics;
use crate::scope::MachineScope;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::{debug, info, warn};

use super::volumes;

const CREATE_MACHINE_ERROR: &str = "CreateMachineError";

/// Find the machine's droplet.
///
/// Looks up `droplet_id` first, then lists the droplets carrying the
/// machine's ownership tag and matches the machine name.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails for a reason other than 404.
pub async fn find(
    scope: &MachineScope,
    droplet_id: Option<u64>,
) -> Result<Option<Droplet>, ReconcileError> {
    if let Some(id) = droplet_id {
        match scope.cloud.droplets.get(id).await {
            Ok(droplet) => return Ok(Some(droplet)),
            Err(e) if e.is_not_found() => {
                debug!(droplet_id = id, "Droplet from providerID not found");
            }
            Err(e) => return Err(e).during(format!("getting droplet {id}")),
        }
    }

    let name = scope.droplet_name();
    let found = scope
        .cloud
        .droplets
        .list_by_tag(&scope.ownership_tag())
        .await
        .during("listing droplets")?
        .into_iter()
        .find(|droplet| droplet.name == name);
    Ok(found)
}

/// Wrap a cloud error from the create path.
///
/// Rejected requests (unknown region, image or size) cannot succeed on retry
/// and become terminal; everything else is retried.
fn create_error(operation: &str, error: CloudError) -> ReconcileError {
    if error.is_validation() || error.is_not_found() {
        ReconcileError::Terminal {
            reason: CREATE_MACHINE_ERROR,
            message: format!("{operation}: {error}"),
        }
    } else {
        ReconcileError::Cloud {
            operation: operation.to_string(),
            source: error,
        }
    }
}

async fn resolve_image(scope: &MachineScope) -> Result<DropletCreateImage, ReconcileError> {
    let image = &scope.do_machine.spec.image;
    let lookup = match image {
        IntOrString::Int(id) if *id > 0 => {
            scope.cloud.images.get_by_id(u64::from(id.unsigned_abs())).await
        }
        IntOrString::String(value) if !value.is_empty() && value != "0" => {
            match value.parse::<u64>() {
                Ok(id) => scope.cloud.images.get_by_id(id).await,
                Err(_) => scope.cloud.images.get_by_slug(value).await,
            }
        }
        _ => {
            return Err(ReconcileError::Terminal {
                reason: CREATE_MACHINE_ERROR,
                message: "unable to get image: no image ID or slug given".to_string(),
            })
        }
    };

    let found = lookup.map_err(|e| create_error("unable to get image", e))?;
    Ok(DropletCreateImage::Id(found.id))
}

async fn resolve_ssh_keys(scope: &MachineScope) -> Result<Vec<DropletCreateSshKey>, ReconcileError> {
    let mut keys = Vec::new();
    for key in scope.do_machine.spec.ssh_keys.clone() {
        let lookup = match &key {
            IntOrString::Int(id) if *id > 0 => {
                scope.cloud.keys.get_by_id(u64::from(id.unsigned_abs())).await
            }
            IntOrString::String(fingerprint) if !fingerprint.is_empty() => {
                match fingerprint.parse::<u64>() {
                    Ok(id) => scope.cloud.keys.get_by_id(id).await,
                    Err(_) => scope.cloud.keys.get_by_fingerprint(fingerprint).await,
                }
            }
            _ => {
                return Err(ReconcileError::Terminal {
                    reason: CREATE_MACHINE_ERROR,
                    message: "unable to get ssh key: empty key reference".to_string(),
                })
            }
        };
        let found = lookup.map_err(|e| create_error("unable to get ssh key", e))?;
        keys.push(DropletCreateSshKey {
            id: found.id,
            fingerprint: found.fingerprint,
        });
    }

    if let Some(public_key) = scope
        .do_machine
        .spec
        .ssh_public_key
        .clone()
        .filter(|key| !key.trim().is_empty())
    {
        let existing = scope
            .cloud
            .keys
            .list()
            .await
            .during("listing ssh keys")?
            .into_iter()
            .find(|key| key.public_key.trim() == public_key.trim());
        let key = match existing {
            Some(key) => key,
            None => {
                info!(machine = %scope.name(), "Uploading SSH public key");
                scope
                    .cloud
                    .keys
                    .create(&KeyCreateRequest {
                        name: scope.droplet_name(),
                        public_key: public_key.trim().to_string(),
                    })
                    .await
                    .map_err(|e| create_error("uploading ssh public key", e))?
            }
        };
        if !keys.iter().any(|k| k.id == key.id) {
            keys.push(DropletCreateSshKey {
                id: key.id,
                fingerprint: key.fingerprint,
            });
        }
    }
    Ok(keys)
}

/// Create the droplet for the machine.
///
/// Every data-disk volume must already exist; a missing one fails with a
/// precondition error naming it.
///
/// # Errors
///
/// Returns a terminal `CreateMachineError` when DigitalOcean rejects the
/// request, and a retryable error for missing volumes and transient failures.
pub async fn create(scope: &mut MachineScope, user_data: &str) -> Result<Droplet, ReconcileError> {
    let mut volume_ids = Vec::new();
    for (name, volume) in volumes::lookup(scope).await? {
        let Some(volume) = volume else {
            return Err(ReconcileError::Precondition(format!(
                "volume \"{name}\" does not exist"
            )));
        };
        volume_ids.push(volume.id);
    }

    let image = resolve_image(scope).await?;
    let ssh_keys = resolve_ssh_keys(scope).await?;

    let request = DropletCreateRequest {
        name: scope.droplet_name(),
        region: scope.region().to_string(),
        size: scope.do_machine.spec.size.clone(),
        image,
        ssh_keys,
        private_networking: true,
        user_data: user_data.to_string(),
        volumes: volume_ids,
        vpc_uuid: scope.vpc_uuid().to_string(),
        tags: scope.droplet_tags(),
    };

    info!(
        name = %request.name,
        region = %request.region,
        size = %request.size,
        "Creating droplet"
    );
    let droplet = match scope.cloud.droplets.create(&request).await {
        Ok(droplet) => droplet,
        Err(e) => {
            warn!(name = %request.name, error = %e, "Failed to create droplet");
            scope.record(PendingEvent::warning(
                reasons::INSTANCE_CREATING_ERROR,
                actions::CREATE,
                format!("Failed to create droplet {}: {e}", request.name),
            ));
            return Err(create_error("creating droplet", e));
        }
    };

    metrics::record_resource_created("droplet");
    scope.set_provider_id(droplet.id);
    scope.set_instance_status(Some(DOResourceStatus::New));
    scope.record(PendingEvent::normal(
        reasons::INSTANCE_CREATED,
        actions::CREATE,
        format!("Created new droplet {} ({})", droplet.name, droplet.id),
    ));
    Ok(droplet)
}

#[cfg(test)]
#[path = "droplet_tests.rs"]
mod droplet_tests;
