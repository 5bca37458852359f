// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Control plane DNS propagation checks.
//!
//! A record counts as propagated once the zone's authoritative name server
//! answers with the expected address:
//!
//! 1. Ask the local resolver (recursion desired) for the SOA of the FQDN.
//! 2. Take the primary name server (`MNAME`) of the first SOA in the
//!    authority section.
//! 3. Ask that server directly for the A record and compare.
//!
//! Queries go through [`DnsExchange`]; production uses the blocking
//! hickory client on a worker thread, tests script the responses.

use crate::constants::{DNS_PORT, DNS_QUERY_TIMEOUT_SECS};
use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::udp::UdpClientConnection;
use hickory_proto::op::Message;
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while checking propagation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// The SOA response carried no authority records.
    #[error("no authority section")]
    NoAuthority,

    /// The authority section held no SOA record.
    #[error("no SOA record in authority section for {0}")]
    NoSoa(String),

    #[error("invalid DNS name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// No usable nameserver in the resolver configuration.
    #[error("no nameserver configured in {0}")]
    NoNameserver(String),

    #[error("DNS query to {server} failed: {reason}")]
    Query { server: String, reason: String },
}

/// Asks one server for one record type and returns the whole response.
#[async_trait]
pub trait DnsExchange: Send + Sync {
    /// `server` is `host:port`; the host may be a name.
    async fn query(
        &self,
        server: &str,
        name: Name,
        record_type: RecordType,
    ) -> Result<Message, DnsError>;
}

/// UDP exchange through `hickory_client::client::SyncClient`.
#[derive(Debug, Clone)]
pub struct UdpExchange {
    timeout: Duration,
}

impl Default for UdpExchange {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DNS_QUERY_TIMEOUT_SECS),
        }
    }
}

fn query_error(server: &str, reason: impl ToString) -> DnsError {
    DnsError::Query {
        server: server.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl DnsExchange for UdpExchange {
    async fn query(
        &self,
        server: &str,
        name: Name,
        record_type: RecordType,
    ) -> Result<Message, DnsError> {
        let server_addr = tokio::net::lookup_host(server)
            .await
            .map_err(|e| query_error(server, e))?
            .next()
            .ok_or_else(|| query_error(server, "name did not resolve"))?;
        let timeout = self.timeout;
        let server_str = server.to_string();

        // hickory-client is sync
        tokio::task::spawn_blocking(move || {
            let conn = UdpClientConnection::with_timeout(server_addr, timeout)
                .map_err(|e| query_error(&server_str, e))?;
            let client = SyncClient::new(conn);
            let response = client
                .query(&name, DNSClass::IN, record_type)
                .map_err(|e| query_error(&server_str, e))?;
            Ok::<_, DnsError>(Message::clone(&response))
        })
        .await
        .map_err(|e| query_error(server, e))?
    }
}

/// First `nameserver` entry of a resolv.conf, as `ip:53`.
#[must_use]
pub fn parse_nameserver(resolv_conf: &str) -> Option<String> {
    resolv_conf.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("nameserver") {
            return None;
        }
        let ip: IpAddr = fields.next()?.parse().ok()?;
        Some(SocketAddr::new(ip, DNS_PORT).to_string())
    })
}

fn fqdn_name(fqdn: &str) -> Result<Name, DnsError> {
    let mut name = Name::from_ascii(fqdn).map_err(|e| DnsError::InvalidName {
        name: fqdn.to_string(),
        reason: e.to_string(),
    })?;
    name.set_fqdn(true);
    Ok(name)
}

/// Checks whether an A record is served by its zone's primary name server.
#[derive(Clone)]
pub struct PropagationChecker {
    resolver: String,
    exchange: Arc<dyn DnsExchange>,
}

impl std::fmt::Debug for PropagationChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationChecker")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl PropagationChecker {
    pub fn new(resolver: impl Into<String>, exchange: Arc<dyn DnsExchange>) -> Self {
        Self {
            resolver: resolver.into(),
            exchange,
        }
    }

    /// Use the first nameserver listed in `path` over UDP.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lists no nameserver.
    pub async fn from_resolv_conf(path: &Path) -> Result<Self, DnsError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| DnsError::NoNameserver(path.display().to_string()))?;
        let resolver = parse_nameserver(&contents)
            .ok_or_else(|| DnsError::NoNameserver(path.display().to_string()))?;
        Ok(Self::new(resolver, Arc::new(UdpExchange::default())))
    }

    #[must_use]
    pub fn resolver(&self) -> &str {
        &self.resolver
    }

    /// Whether `fqdn` resolves to `expected_ip` at its authoritative server.
    ///
    /// A missing answer or NXDOMAIN is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::NoAuthority`] when the SOA lookup has an empty
    /// authority section, and transport errors from either query.
    pub async fn is_propagated(&self, fqdn: &str, expected_ip: &str) -> Result<bool, DnsError> {
        let name = fqdn_name(fqdn)?;
        let soa = self
            .exchange
            .query(&self.resolver, name.clone(), RecordType::SOA)
            .await?;

        if soa.name_servers().is_empty() {
            return Err(DnsError::NoAuthority);
        }
        let primary = soa
            .name_servers()
            .iter()
            .find_map(|record| match record.data() {
                Some(RData::SOA(soa)) => Some(soa.mname().to_utf8()),
                _ => None,
            })
            .ok_or_else(|| DnsError::NoSoa(fqdn.to_string()))?;
        let authoritative = format!("{}:{DNS_PORT}", primary.trim_end_matches('.'));

        let answer = self
            .exchange
            .query(&authoritative, name, RecordType::A)
            .await?;

        let found = answer.answers().iter().any(|record| match record.data() {
            Some(RData::A(address)) => address.to_string() == expected_ip,
            _ => false,
        });
        debug!(
            fqdn = %fqdn,
            expected_ip = %expected_ip,
            authoritative = %authoritative,
            propagated = found,
            "Checked DNS propagation"
        );
        Ok(found)
    }
}

/// Replays canned responses in order and records what was asked.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedExchange {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<Message, DnsError>>>,
    pub asked: std::sync::Mutex<Vec<(String, RecordType)>>,
}

#[cfg(test)]
impl ScriptedExchange {
    pub fn new(responses: Vec<Result<Message, DnsError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: std::sync::Mutex::new(responses.into()),
            asked: std::sync::Mutex::default(),
        })
    }
}

#[cfg(test)]
#[async_trait]
impl DnsExchange for ScriptedExchange {
    async fn query(
        &self,
        server: &str,
        _name: Name,
        record_type: RecordType,
    ) -> Result<Message, DnsError> {
        self.asked
            .lock()
            .expect("asked lock")
            .push((server.to_string(), record_type));
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(query_error(server, "no scripted response left")))
    }
}
