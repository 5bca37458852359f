// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `v1alpha4` API types.
//!
//! Compared to the hub this version names the load balancer
//! `apiServerLoadbalancers`, has no control plane DNS record and no
//! `sshPublicKey`.

use super::{marshal_data, restore_machine_spec, unmarshal_data, ConversionError, Convertible};
use crate::crd::{
    self, APIEndpoint, DOLoadBalancer, DOResourceReference, DOResourceStatus, DOVPC, DOVolume,
    DataDisk, MachineAddress,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DONetwork {
    #[serde(default)]
    pub api_server_loadbalancers: DOLoadBalancer,

    #[serde(default)]
    pub vpc: DOVPC,
}

#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha4",
    kind = "DOCluster",
    namespaced,
    status = "DOClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct DOClusterSpec {
    pub region: String,

    #[serde(default)]
    pub network: DONetwork,

    #[serde(default)]
    pub control_plane_endpoint: APIEndpoint,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DONetworkResource {
    #[serde(default)]
    pub api_server_loadbalancers_ref: DOResourceReference,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOClusterStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub network: DONetworkResource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha4",
    kind = "DOMachine",
    namespaced,
    status = "DOMachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct DOMachineSpec {
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    pub size: String,

    pub image: IntOrString,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<DataDisk>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<IntOrString>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DOMachineStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MachineAddress>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<DOVolume>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_status: Option<DOResourceStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DOMachineTemplateResource {
    pub spec: DOMachineSpec,
}

#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha4",
    kind = "DOMachineTemplate",
    namespaced
)]
pub struct DOMachineTemplateSpec {
    pub template: DOMachineTemplateResource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DOClusterTemplateResource {
    pub spec: DOClusterSpec,
}

#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha4",
    kind = "DOClusterTemplate",
    namespaced
)]
pub struct DOClusterTemplateSpec {
    pub template: DOClusterTemplateResource,
}

// ============================================================================
// Field mapping
// ============================================================================

fn cluster_spec_up(src: &DOClusterSpec) -> crd::DOClusterSpec {
    crd::DOClusterSpec {
        region: src.region.clone(),
        network: crd::DONetwork {
            load_balancer: src.network.api_server_loadbalancers.clone(),
            vpc: src.network.vpc.clone(),
        },
        control_plane_endpoint: src.control_plane_endpoint.clone(),
        control_plane_dns: None,
    }
}

fn cluster_spec_down(src: &crd::DOClusterSpec) -> DOClusterSpec {
    DOClusterSpec {
        region: src.region.clone(),
        network: DONetwork {
            api_server_loadbalancers: src.network.load_balancer.clone(),
            vpc: src.network.vpc.clone(),
        },
        control_plane_endpoint: src.control_plane_endpoint.clone(),
    }
}

fn machine_spec_up(src: &DOMachineSpec) -> crd::DOMachineSpec {
    crd::DOMachineSpec {
        provider_id: src.provider_id.clone(),
        size: src.size.clone(),
        image: src.image.clone(),
        data_disks: src.data_disks.clone(),
        ssh_keys: src.ssh_keys.clone(),
        ssh_public_key: None,
        additional_tags: src.additional_tags.clone(),
    }
}

fn machine_spec_down(src: &crd::DOMachineSpec) -> DOMachineSpec {
    DOMachineSpec {
        provider_id: src.provider_id.clone(),
        size: src.size.clone(),
        image: src.image.clone(),
        data_disks: src.data_disks.clone(),
        ssh_keys: src.ssh_keys.clone(),
        additional_tags: src.additional_tags.clone(),
    }
}

impl Convertible for DOCluster {
    type Hub = crd::DOCluster;

    fn to_hub(&self) -> Result<crd::DOCluster, ConversionError> {
        let mut metadata = self.metadata.clone();
        let restored: Option<crd::DOCluster> = unmarshal_data(&mut metadata)?;

        let mut dst = crd::DOCluster {
            metadata,
            spec: cluster_spec_up(&self.spec),
            status: self.status.as_ref().map(|status| crd::DOClusterStatus {
                ready: status.ready,
                control_plane_dns_record_ready: false,
                network: crd::DONetworkResource {
                    load_balancer_ref: status.network.api_server_loadbalancers_ref.clone(),
                },
                failure_reason: status.failure_reason.clone(),
                failure_message: status.failure_message.clone(),
            }),
        };

        if let Some(restored) = restored {
            dst.spec.control_plane_dns = restored.spec.control_plane_dns;
            if let (Some(status), Some(previous)) = (dst.status.as_mut(), restored.status) {
                status.control_plane_dns_record_ready = previous.control_plane_dns_record_ready;
            }
        }
        Ok(dst)
    }

    fn from_hub(hub: &crd::DOCluster) -> Result<Self, ConversionError> {
        let mut dst = DOCluster {
            metadata: hub.metadata.clone(),
            spec: cluster_spec_down(&hub.spec),
            status: hub.status.as_ref().map(|status| DOClusterStatus {
                ready: status.ready,
                network: DONetworkResource {
                    api_server_loadbalancers_ref: status.network.load_balancer_ref.clone(),
                },
                failure_reason: status.failure_reason.clone(),
                failure_message: status.failure_message.clone(),
            }),
        };
        marshal_data(hub, &mut dst.metadata)?;
        Ok(dst)
    }
}

impl Convertible for DOMachine {
    type Hub = crd::DOMachine;

    fn to_hub(&self) -> Result<crd::DOMachine, ConversionError> {
        let mut metadata = self.metadata.clone();
        let restored: Option<crd::DOMachine> = unmarshal_data(&mut metadata)?;

        let mut dst = crd::DOMachine {
            metadata,
            spec: machine_spec_up(&self.spec),
            status: self.status.as_ref().map(|status| crd::DOMachineStatus {
                ready: status.ready,
                addresses: status.addresses.clone(),
                volumes: status.volumes.clone(),
                instance_status: status.instance_status,
                failure_reason: status.failure_reason.clone(),
                failure_message: status.failure_message.clone(),
            }),
        };

        if let Some(restored) = restored {
            restore_machine_spec(&mut dst.spec, restored.spec, false);
        }
        Ok(dst)
    }

    fn from_hub(hub: &crd::DOMachine) -> Result<Self, ConversionError> {
        let mut dst = DOMachine {
            metadata: hub.metadata.clone(),
            spec: machine_spec_down(&hub.spec),
            status: hub.status.as_ref().map(|status| DOMachineStatus {
                ready: status.ready,
                addresses: status.addresses.clone(),
                volumes: status.volumes.clone(),
                instance_status: status.instance_status,
                failure_reason: status.failure_reason.clone(),
                failure_message: status.failure_message.clone(),
            }),
        };
        marshal_data(hub, &mut dst.metadata)?;
        Ok(dst)
    }
}

impl Convertible for DOMachineTemplate {
    type Hub = crd::DOMachineTemplate;

    fn to_hub(&self) -> Result<crd::DOMachineTemplate, ConversionError> {
        let mut metadata = self.metadata.clone();
        let restored: Option<crd::DOMachineTemplate> = unmarshal_data(&mut metadata)?;

        let mut spec = machine_spec_up(&self.spec.template.spec);
        if let Some(restored) = restored {
            restore_machine_spec(&mut spec, restored.spec.template.spec, false);
        }
        Ok(crd::DOMachineTemplate {
            metadata,
            spec: crd::DOMachineTemplateSpec {
                template: crd::DOMachineTemplateResource { spec },
            },
        })
    }

    fn from_hub(hub: &crd::DOMachineTemplate) -> Result<Self, ConversionError> {
        let mut dst = DOMachineTemplate {
            metadata: hub.metadata.clone(),
            spec: DOMachineTemplateSpec {
                template: DOMachineTemplateResource {
                    spec: machine_spec_down(&hub.spec.template.spec),
                },
            },
        };
        marshal_data(hub, &mut dst.metadata)?;
        Ok(dst)
    }
}

impl Convertible for DOClusterTemplate {
    type Hub = crd::DOClusterTemplate;

    fn to_hub(&self) -> Result<crd::DOClusterTemplate, ConversionError> {
        let mut metadata = self.metadata.clone();
        let restored: Option<crd::DOClusterTemplate> = unmarshal_data(&mut metadata)?;

        let mut spec = cluster_spec_up(&self.spec.template.spec);
        if let Some(restored) = restored {
            spec.control_plane_dns = restored.spec.template.spec.control_plane_dns;
        }
        Ok(crd::DOClusterTemplate {
            metadata,
            spec: crd::DOClusterTemplateSpec {
                template: crd::DOClusterTemplateResource { spec },
            },
        })
    }

    fn from_hub(hub: &crd::DOClusterTemplate) -> Result<Self, ConversionError> {
        let mut dst = DOClusterTemplate {
            metadata: hub.metadata.clone(),
            spec: DOClusterTemplateSpec {
                template: DOClusterTemplateResource {
                    spec: cluster_spec_down(&hub.spec.template.spec),
                },
            },
        };
        marshal_data(hub, &mut dst.metadata)?;
        Ok(dst)
    }
}
