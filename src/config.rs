// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line configuration of the provider.
//!
//! Every flag can also be set through the environment variable named next to
//! it, which is how the manager Deployment configures the pod.

use crate::constants::{
    DEFAULT_CONTROLLER_CONCURRENCY, DEFAULT_HEALTH_ADDR, DEFAULT_LEASE_DURATION_SECS,
    DEFAULT_LEASE_NAME, DEFAULT_LEASE_RENEW_DEADLINE_SECS, DEFAULT_METRICS_ADDR,
    DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_RESOLV_CONF, DEFAULT_SYNC_PERIOD_SECS,
    DEFAULT_WEBHOOK_CERT_DIR, DEFAULT_WEBHOOK_PORT, DO_API_URL,
};
use crate::context::ReconcileSettings;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "capdo", version, about = "Cluster API infrastructure provider for DigitalOcean")]
pub struct Config {
    /// Only the lease holder runs controllers
    #[arg(long = "leader-elect", env = "CAPDO_LEADER_ELECT")]
    pub leader_elect: bool,

    #[arg(long = "leader-election-id", env = "CAPDO_LEADER_ELECTION_ID", default_value = DEFAULT_LEASE_NAME)]
    pub leader_election_id: String,

    /// Namespace of the lease; defaults to the pod namespace
    #[arg(long = "leader-election-namespace", env = "POD_NAMESPACE")]
    pub leader_election_namespace: Option<String>,

    /// Seconds a lease stays valid without renewal
    #[arg(long = "leader-elect-lease-duration", env = "CAPDO_LEASE_DURATION", default_value_t = DEFAULT_LEASE_DURATION_SECS)]
    pub lease_duration_secs: u64,

    /// Seconds the leader keeps trying to renew before giving up
    #[arg(long = "leader-elect-renew-deadline", env = "CAPDO_LEASE_RENEW_DEADLINE", default_value_t = DEFAULT_LEASE_RENEW_DEADLINE_SECS)]
    pub renew_deadline_secs: u64,

    /// Watch a single namespace instead of the whole cluster
    #[arg(long, env = "CAPDO_NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds between resyncs of converged objects
    #[arg(long = "sync-period", env = "CAPDO_SYNC_PERIOD", default_value_t = DEFAULT_SYNC_PERIOD_SECS)]
    pub sync_period_secs: u64,

    /// Seconds a single reconcile may take
    #[arg(long = "reconcile-timeout", env = "CAPDO_RECONCILE_TIMEOUT", default_value_t = DEFAULT_RECONCILE_TIMEOUT_SECS)]
    pub reconcile_timeout_secs: u64,

    /// Concurrent reconciles per controller (0 means unbounded)
    #[arg(long, env = "CAPDO_CONCURRENCY", default_value_t = DEFAULT_CONTROLLER_CONCURRENCY)]
    pub concurrency: u16,

    /// Run the DOKS managed cluster controllers
    #[arg(long = "enable-doks", env = "CAPDO_ENABLE_DOKS")]
    pub enable_doks: bool,

    #[arg(long = "webhook-port", env = "CAPDO_WEBHOOK_PORT", default_value_t = DEFAULT_WEBHOOK_PORT)]
    pub webhook_port: u16,

    #[arg(long = "webhook-cert-dir", env = "CAPDO_WEBHOOK_CERT_DIR", default_value = DEFAULT_WEBHOOK_CERT_DIR)]
    pub webhook_cert_dir: PathBuf,

    #[arg(long = "webhook-cert-name", env = "CAPDO_WEBHOOK_CERT_NAME", default_value = "tls.crt")]
    pub webhook_cert_name: String,

    #[arg(long = "webhook-key-name", env = "CAPDO_WEBHOOK_KEY_NAME", default_value = "tls.key")]
    pub webhook_key_name: String,

    #[arg(long = "disable-webhooks", env = "CAPDO_DISABLE_WEBHOOKS")]
    pub disable_webhooks: bool,

    /// Address of the `/metrics` listener, `0` disables it
    #[arg(long = "metrics-bind-address", env = "CAPDO_METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_bind_address: String,

    #[arg(long = "health-probe-bind-address", env = "CAPDO_HEALTH_PROBE_BIND_ADDRESS", default_value = DEFAULT_HEALTH_ADDR)]
    pub health_probe_bind_address: SocketAddr,

    #[arg(long = "do-api-url", env = "DIGITALOCEAN_API_URL", default_value = DO_API_URL)]
    pub do_api_url: String,

    /// Resolver configuration used for DNS propagation checks
    #[arg(long = "resolv-conf", env = "CAPDO_RESOLV_CONF", default_value = DEFAULT_RESOLV_CONF)]
    pub resolv_conf: PathBuf,

    #[arg(long = "log-format", env = "RUST_LOG_FORMAT", value_enum, ignore_case = true, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Metrics listener address, `None` when disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is neither `0` nor a socket address.
    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>, std::net::AddrParseError> {
        if self.metrics_bind_address == "0" {
            return Ok(None);
        }
        self.metrics_bind_address.parse().map(Some)
    }

    #[must_use]
    pub fn webhook_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.webhook_port))
    }

    #[must_use]
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            sync_period: Duration::from_secs(self.sync_period_secs),
            reconcile_timeout: Duration::from_secs(self.reconcile_timeout_secs),
        }
    }

    /// Lease namespace, falling back to `default` outside a pod.
    #[must_use]
    pub fn lease_namespace(&self) -> &str {
        self.leader_election_namespace.as_deref().unwrap_or("default")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
