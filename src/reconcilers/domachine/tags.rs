// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Droplet tag convergence.

use crate::cloud::types::{Droplet, TagResource};
use crate::constants::TAG_RESOURCE_TYPE_DROPLET;
use crate::errors::{CloudResultExt, ReconcileError};
use crate::scope::MachineScope;
use tracing::info;

/// Attach missing tags and detach extra ones so the droplet carries exactly
/// the machine's tag set. Missing tags are created first.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails.
pub async fn reconcile(scope: &MachineScope, droplet: &Droplet) -> Result<(), ReconcileError> {
    let desired = scope.droplet_tags();
    let resources = [TagResource {
        resource_id: droplet.id.to_string(),
        resource_type: TAG_RESOURCE_TYPE_DROPLET.to_string(),
    }];

    for tag in desired.iter().filter(|tag| !droplet.tags.contains(tag)) {
        match scope.cloud.tags.get(tag).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                scope
                    .cloud
                    .tags
                    .create(tag)
                    .await
                    .during(format!("creating tag {tag}"))?;
            }
            Err(e) => return Err(e).during(format!("getting tag {tag}")),
        }
        info!(droplet_id = droplet.id, tag = %tag, "Tagging droplet");
        scope
            .cloud
            .tags
            .tag_resources(tag, &resources)
            .await
            .during(format!("tagging droplet {} with {tag}", droplet.id))?;
    }

    for tag in droplet.tags.iter().filter(|tag| !desired.contains(tag)) {
        info!(droplet_id = droplet.id, tag = %tag, "Untagging droplet");
        scope
            .cloud
            .tags
            .untag_resources(tag, &resources)
            .await
            .during(format!("untagging droplet {} from {tag}", droplet.id))?;
    }
    Ok(())
}
