// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `v1alpha3` API types.
//!
//! The oldest served version: no VPC, no data disks or volumes, no control
//! plane DNS record and no `sshPublicKey`. `DOClusterTemplate` did not exist yet.

use super::{marshal_data, restore_machine_spec, unmarshal_data, ConversionError, Convertible};
use crate::crd::{
    self, APIEndpoint, DOLoadBalancer, DOResourceReference, DOResourceStatus, MachineAddress,
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
}

#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha3",
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
    version = "v1alpha3",
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
    version = "v1alpha3",
    kind = "DOMachineTemplate",
    namespaced
)]
pub struct DOMachineTemplateSpec {
    pub template: DOMachineTemplateResource,
}

// ============================================================================
// Field mapping
// ============================================================================

fn machine_spec_up(src: &DOMachineSpec) -> crd::DOMachineSpec {
    crd::DOMachineSpec {
        provider_id: src.provider_id.clone(),
        size: src.size.clone(),
        image: src.image.clone(),
        data_disks: Vec::new(),
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
            spec: crd::DOClusterSpec {
                region: self.spec.region.clone(),
                network: crd::DONetwork {
                    load_balancer: self.spec.network.api_server_loadbalancers.clone(),
                    vpc: crd::DOVPC::default(),
                },
                control_plane_endpoint: self.spec.control_plane_endpoint.clone(),
                control_plane_dns: None,
            },
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
            dst.spec.network.vpc = restored.spec.network.vpc;
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
            spec: DOClusterSpec {
                region: hub.spec.region.clone(),
                network: DONetwork {
                    api_server_loadbalancers: hub.spec.network.load_balancer.clone(),
                },
                control_plane_endpoint: hub.spec.control_plane_endpoint.clone(),
            },
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
                volumes: Vec::new(),
                instance_status: status.instance_status,
                failure_reason: status.failure_reason.clone(),
                failure_message: status.failure_message.clone(),
            }),
        };

        if let Some(restored) = restored {
            restore_machine_spec(&mut dst.spec, restored.spec, true);
            if let (Some(status), Some(previous)) = (dst.status.as_mut(), restored.status) {
                status.volumes = previous.volumes;
            }
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
            restore_machine_spec(&mut spec, restored.spec.template.spec, true);
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
