// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Control plane A record of a `DOCluster`.
//!
//! The record lives in a domain hosted on DigitalOcean DNS and points the
//! configured name at the load balancer address. The endpoint is only
//! published once the zone's authoritative server answers with that address.

use crate::cloud::types::DomainRecordEditRequest;
use crate::constants::CONTROL_PLANE_DNS_TTL_SECS;
use crate::crd::DOControlPlaneDNS;
use crate::errors::{CloudResultExt, ReconcileError};
use crate::events::{actions, reasons, PendingEvent};
use crate::metrics;
use crate::scope::ClusterScope;
use tracing::{debug, info};

const RECORD_TYPE_A: &str = "A";

fn desired_record(dns: &DOControlPlaneDNS, ip: &str) -> DomainRecordEditRequest {
    DomainRecordEditRequest {
        record_type: RECORD_TYPE_A.to_string(),
        name: dns.name.clone(),
        data: ip.to_string(),
        ttl: CONTROL_PLANE_DNS_TTL_SECS,
    }
}

/// Create or correct the A record so it points at `ip`.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails.
pub async fn reconcile(
    scope: &mut ClusterScope,
    dns: &DOControlPlaneDNS,
    ip: &str,
) -> Result<(), ReconcileError> {
    let fqdn = dns.fqdn();
    let desired = desired_record(dns, ip);
    let existing = scope
        .cloud
        .domains
        .a_records_by_name(&dns.domain, &fqdn)
        .await
        .during(format!("listing records of {}", dns.domain))?;

    match existing.first() {
        None => {
            info!(fqdn = %fqdn, ip = %ip, "Creating control plane DNS record");
            scope
                .cloud
                .domains
                .create_record(&dns.domain, &desired)
                .await
                .during(format!("creating record {fqdn}"))?;
            metrics::record_resource_created("dns_record");
            scope.record(PendingEvent::normal(
                reasons::DNS_RECORD_CREATED,
                actions::CREATE,
                format!("Created DNS record {fqdn} -> {ip}"),
            ));
        }
        Some(record) if record.data != desired.data || record.ttl != desired.ttl => {
            info!(
                fqdn = %fqdn,
                current = %record.data,
                ip = %ip,
                "Updating control plane DNS record"
            );
            scope
                .cloud
                .domains
                .edit_record(&dns.domain, record.id, &desired)
                .await
                .during(format!("updating record {fqdn}"))?;
            metrics::record_resource_updated("dns_record");
        }
        Some(_) => debug!(fqdn = %fqdn, "Control plane DNS record up to date"),
    }
    Ok(())
}

/// Whether the authoritative server already answers with `ip`.
///
/// # Errors
///
/// Returns an internal error when no propagation checker is configured and
/// the checker's error when the lookup fails.
pub async fn is_propagated(
    scope: &ClusterScope,
    dns: &DOControlPlaneDNS,
    ip: &str,
) -> Result<bool, ReconcileError> {
    let Some(checker) = scope.dns.as_ref() else {
        return Err(ReconcileError::Internal(
            "no DNS resolver configured for propagation checks".to_string(),
        ));
    };

    match checker.is_propagated(&dns.fqdn(), ip).await {
        Ok(true) => {
            metrics::record_dns_propagation_check("propagated");
            Ok(true)
        }
        Ok(false) => {
            metrics::record_dns_propagation_check("pending");
            Ok(false)
        }
        Err(e) => {
            metrics::record_dns_propagation_check("error");
            Err(e.into())
        }
    }
}

/// Delete every A record of the control plane name. Returns how many went.
///
/// # Errors
///
/// Returns an error if a DigitalOcean call fails for a reason other than 404.
pub async fn delete(scope: &mut ClusterScope, dns: &DOControlPlaneDNS) -> Result<usize, ReconcileError> {
    let fqdn = dns.fqdn();
    let records = match scope.cloud.domains.a_records_by_name(&dns.domain, &fqdn).await {
        Ok(records) => records,
        Err(e) if e.is_not_found() => return Ok(0),
        Err(e) => return Err(e).during(format!("listing records of {}", dns.domain)),
    };

    let mut deleted = 0;
    for record in records {
        match scope.cloud.domains.delete_record(&dns.domain, record.id).await {
            Ok(()) => deleted += 1,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e).during(format!("deleting record {fqdn}")),
        }
    }
    if deleted > 0 {
        info!(fqdn = %fqdn, count = deleted, "Deleted control plane DNS record");
        metrics::record_resource_deleted("dns_record");
        scope.record(PendingEvent::normal(
            reasons::DNS_RECORD_DELETED,
            actions::DELETE,
            format!("Deleted DNS record {fqdn}"),
        ));
    }
    Ok(deleted)
}
