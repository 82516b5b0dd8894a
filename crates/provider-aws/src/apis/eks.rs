//! EKS managed node groups.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use managed::{Condition, ResourceSpec};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "eks.aws.cloudplane.io",
    version = "v1alpha1",
    kind = "NodeGroup",
    status = "NodeGroupStatus"
)]
#[kube(derive = "PartialEq")]
#[kube(printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#)]
#[kube(printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#)]
#[kube(printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.forProvider.clusterName"}"#)]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.atProvider.status"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,

    pub for_provider: NodeGroupParameters,
}

/// Desired state of an EKS node group.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupParameters {
    /// Name of the EKS cluster the node group belongs to
    pub cluster_name: String,

    /// IAM role ARN the worker nodes assume
    pub node_role: String,

    /// Subnets for the node group's Auto Scaling group
    pub subnets: Vec<String>,

    /// AMI type, e.g. `AL2_x86_64`. Immutable after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_type: Option<String>,

    /// Root volume size in GiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_types: Vec<String>,

    /// Kubernetes labels applied to the nodes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// AMI release version. Defaults to the latest for the Kubernetes
    /// version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_access: Option<RemoteAccessConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_config: Option<NodeGroupScalingConfig>,

    /// Tags applied to the node group itself
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// Kubernetes version. Defaults to the cluster's version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccessConfig {
    #[serde(default, rename = "ec2SshKey", skip_serializing_if = "Option::is_none")]
    pub ec2_ssh_key: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_security_groups: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupScalingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_size: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<i32>,
}

/// Lifecycle state reported by EKS.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum NodeGroupStatusType {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "CREATING")]
    Creating,
    #[serde(rename = "UPDATING")]
    Updating,
    #[serde(rename = "DELETING")]
    Deleting,
    #[serde(rename = "CREATE_FAILED")]
    CreateFailed,
    #[serde(rename = "DELETE_FAILED")]
    DeleteFailed,
    #[serde(rename = "DEGRADED")]
    Degraded,
    #[default]
    #[serde(rename = "", other)]
    Unknown,
}

impl NodeGroupStatusType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Creating => "CREATING",
            Self::Updating => "UPDATING",
            Self::Deleting => "DELETING",
            Self::CreateFailed => "CREATE_FAILED",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::Degraded => "DEGRADED",
            Self::Unknown => "",
        }
    }
}

impl From<&str> for NodeGroupStatusType {
    fn from(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "CREATING" => Self::Creating,
            "UPDATING" => Self::Updating,
            "DELETING" => Self::Deleting,
            "CREATE_FAILED" => Self::CreateFailed,
            "DELETE_FAILED" => Self::DeleteFailed,
            "DEGRADED" => Self::Degraded,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for NodeGroupStatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of an EKS node group.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Time>,

    #[serde(default)]
    pub health: NodeGroupHealth,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<Time>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_group_arn: Option<String>,

    #[serde(default)]
    pub resources: NodeGroupResources,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_config: Option<NodeGroupScalingConfig>,

    #[serde(default)]
    pub status: NodeGroupStatusType,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct NodeGroupHealth {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_scaling_groups: Vec<AutoScalingGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_access_security_group: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct AutoScalingGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupStatus {
    #[serde(default)]
    pub at_provider: NodeGroupObservation,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

managed::impl_managed!(NodeGroup, NodeGroupStatus);

impl NodeGroup {
    /// Last status reported by EKS.
    #[must_use]
    pub fn observed_status(&self) -> NodeGroupStatusType {
        self.status
            .as_ref()
            .map(|s| s.at_provider.status)
            .unwrap_or_default()
    }
}
