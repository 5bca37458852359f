// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object builders shared by the reconciler tests.

use crate::capi::{Cluster, ClusterSpec, ClusterStatus, Machine, MachinePool, MachinePoolSpec, MachineSpec};
use crate::crd::{
    DOCluster, DOClusterSpec, DOControlPlaneDNS, DOKSCluster, DOKSClusterSpec,
    DOKSControlPlane, DOKSControlPlaneSpec, DOKSDefaultNodePool, DOKSNodePool, DOKSNodePoolSpec,
    DOMachine, DOMachineSpec, DataDisk,
};
use crate::labels::CONTROL_PLANE_LABEL;
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::rdata::{A, SOA};
use hickory_proto::rr::{Name, RData, Record};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::jiff::Timestamp;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub const NAMESPACE: &str = "default";
pub const CLUSTER_NAME: &str = "capdo-test";
pub const CLUSTER_UID: &str = "0f6cbd2c-1111-2222-3333-444455556666";
pub const REGION: &str = "nyc1";

pub fn cluster(infrastructure_ready: bool) -> Cluster {
    let mut cluster = Cluster::new(CLUSTER_NAME, ClusterSpec::default());
    cluster.metadata.namespace = Some(NAMESPACE.to_string());
    cluster.metadata.uid = Some(CLUSTER_UID.to_string());
    cluster.status = Some(ClusterStatus {
        infrastructure_ready,
        ..Default::default()
    });
    cluster
}

pub fn do_cluster() -> DOCluster {
    let mut do_cluster = DOCluster::new(
        CLUSTER_NAME,
        DOClusterSpec {
            region: REGION.to_string(),
            network: Default::default(),
            control_plane_endpoint: Default::default(),
            control_plane_dns: None,
        },
    );
    do_cluster.metadata.namespace = Some(NAMESPACE.to_string());
    do_cluster
}

pub fn do_cluster_with_dns(domain: &str, name: &str) -> DOCluster {
    let mut do_cluster = do_cluster();
    do_cluster.spec.control_plane_dns = Some(DOControlPlaneDNS {
        domain: domain.to_string(),
        name: name.to_string(),
    });
    do_cluster
}

pub fn machine(name: &str, control_plane: bool) -> Machine {
    let mut machine = Machine::new(
        name,
        MachineSpec {
            cluster_name: CLUSTER_NAME.to_string(),
            ..Default::default()
        },
    );
    machine.metadata.namespace = Some(NAMESPACE.to_string());
    if control_plane {
        machine.metadata.labels = Some(BTreeMap::from([(
            CONTROL_PLANE_LABEL.to_string(),
            String::new(),
        )]));
    }
    machine
}

pub fn do_machine(name: &str) -> DOMachine {
    let mut do_machine = DOMachine::new(
        name,
        DOMachineSpec {
            provider_id: None,
            size: "s-2vcpu-2gb".to_string(),
            image: IntOrString::String("ubuntu-22-04-x64".to_string()),
            data_disks: Vec::new(),
            ssh_keys: vec![IntOrString::Int(1234)],
            ssh_public_key: None,
            additional_tags: Vec::new(),
        },
    );
    do_machine.metadata.namespace = Some(NAMESPACE.to_string());
    do_machine
}

pub fn data_disk(suffix: &str, size: i64) -> DataDisk {
    DataDisk {
        name_suffix: suffix.to_string(),
        disk_size_gb: size,
        filesystem_type: Some("ext4".to_string()),
        filesystem_label: None,
    }
}

pub fn doks_cluster() -> DOKSCluster {
    let mut doks = DOKSCluster::new(
        CLUSTER_NAME,
        DOKSClusterSpec {
            region: REGION.to_string(),
            version: "1.31.1-do.0".to_string(),
            vpc_uuid: None,
            provider_id: None,
            control_plane_endpoint: Default::default(),
            default_node_pool: DOKSDefaultNodePool {
                name: "default".to_string(),
                size: "s-2vcpu-4gb".to_string(),
                count: 2,
            },
        },
    );
    doks.metadata.namespace = Some(NAMESPACE.to_string());
    doks
}

pub fn doks_control_plane() -> DOKSControlPlane {
    let mut control_plane = DOKSControlPlane::new(
        CLUSTER_NAME,
        DOKSControlPlaneSpec {
            version: "1.31.1-do.0".to_string(),
        },
    );
    control_plane.metadata.namespace = Some(NAMESPACE.to_string());
    control_plane.metadata.uid = Some("cp-uid".to_string());
    control_plane
}

pub fn machine_pool(name: &str, replicas: Option<i32>) -> MachinePool {
    let mut pool = MachinePool::new(
        name,
        MachinePoolSpec {
            cluster_name: CLUSTER_NAME.to_string(),
            replicas,
        },
    );
    pool.metadata.namespace = Some(NAMESPACE.to_string());
    pool
}

pub fn doks_node_pool(name: &str) -> DOKSNodePool {
    let mut pool = DOKSNodePool::new(
        name,
        DOKSNodePoolSpec {
            size: "s-2vcpu-4gb".to_string(),
            auto_scale: false,
            min_nodes: None,
            max_nodes: None,
            provider_id_list: Vec::new(),
        },
    );
    pool.metadata.namespace = Some(NAMESPACE.to_string());
    pool
}

/// Mark an object as being deleted.
pub fn deleting(meta: &mut k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) {
    meta.deletion_timestamp = Some(Time(Timestamp::now()));
}

fn dns_name(value: &str) -> Name {
    Name::from_str(value).expect("valid name")
}

/// Resolver answer carrying the zone SOA in the authority section.
pub fn soa_response(mname: &str) -> Message {
    let mut message = Message::new();
    message.set_message_type(MessageType::Response);
    message.add_name_server(Record::from_rdata(
        dns_name("example.com."),
        300,
        RData::SOA(SOA::new(
            dns_name(mname),
            dns_name("hostmaster.example.com."),
            2024010101,
            7200,
            3600,
            1_209_600,
            300,
        )),
    ));
    message
}

/// Authoritative answer for an A query.
pub fn a_response(ip: Option<Ipv4Addr>) -> Message {
    let mut message = Message::new();
    message.set_message_type(MessageType::Response);
    if let Some(ip) = ip {
        message.add_answer(Record::from_rdata(
            dns_name("api.example.com."),
            30,
            RData::A(A(ip)),
        ));
    }
    message
}
