//! EKS node group client and the conversions between node group resources
//! and EKS requests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_eks::primitives::DateTime as AwsDateTime;
use aws_sdk_eks::types::{AmiTypes, NodegroupScalingConfig, RemoteAccessConfig as AwsRemoteAccess, UpdateLabelsPayload};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use managed::util::{diff_tags, LateInitializer};

use super::{service_error, ClientError};
use crate::apis::eks::{
    AutoScalingGroup, Issue, NodeGroupHealth, NodeGroupObservation, NodeGroupParameters,
    NodeGroupResources, NodeGroupScalingConfig, NodeGroupStatusType, RemoteAccessConfig,
};

/// EKS error code for a node group or cluster that does not exist.
pub const ERR_CODE_NOT_FOUND: &str = "ResourceNotFoundException";

/// A node group as described by EKS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedNodeGroup {
    pub arn: Option<String>,
    pub status: NodeGroupStatusType,
    pub version: Option<String>,
    pub release_version: Option<String>,
    pub ami_type: Option<String>,
    pub disk_size: Option<i32>,
    pub instance_types: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub remote_access: Option<RemoteAccessConfig>,
    pub scaling_config: Option<NodeGroupScalingConfig>,
    pub tags: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub health: NodeGroupHealth,
    pub resources: NodeGroupResources,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateNodeGroupInput {
    pub cluster_name: String,
    pub node_group_name: String,
    pub parameters: NodeGroupParameters,
}

/// Label and scaling changes for an existing node group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateNodeGroupConfigInput {
    pub cluster_name: String,
    pub node_group_name: String,
    pub add_or_update_labels: BTreeMap<String, String>,
    pub remove_labels: Vec<String>,
    pub scaling_config: Option<NodeGroupScalingConfig>,
}

impl UpdateNodeGroupConfigInput {
    /// True when the request would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add_or_update_labels.is_empty()
            && self.remove_labels.is_empty()
            && self.scaling_config.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateNodeGroupVersionInput {
    pub cluster_name: String,
    pub node_group_name: String,
    pub version: Option<String>,
}

/// Operations on EKS managed node groups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeGroupClient: Send + Sync {
    async fn describe(&self, cluster: &str, name: &str) -> Result<ObservedNodeGroup, ClientError>;

    async fn create(&self, input: CreateNodeGroupInput) -> Result<(), ClientError>;

    async fn update_config(&self, input: UpdateNodeGroupConfigInput) -> Result<(), ClientError>;

    async fn update_version(&self, input: UpdateNodeGroupVersionInput) -> Result<(), ClientError>;

    async fn delete(&self, cluster: &str, name: &str) -> Result<(), ClientError>;

    async fn tag(&self, arn: &str, tags: BTreeMap<String, String>) -> Result<(), ClientError>;

    async fn untag(&self, arn: &str, keys: Vec<String>) -> Result<(), ClientError>;
}

/// [`NodeGroupClient`] backed by the AWS SDK.
#[derive(Clone)]
pub struct EksClient {
    client: aws_sdk_eks::Client,
}

impl EksClient {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_eks::Client::new(config),
        }
    }
}

fn to_hash_map(map: &BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    (!map.is_empty()).then(|| map.clone().into_iter().collect())
}

fn to_btree_map(map: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    map.map(|m| m.clone().into_iter().collect())
        .unwrap_or_default()
}

fn to_chrono(dt: Option<&AwsDateTime>) -> Option<DateTime<Utc>> {
    dt.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

fn to_aws_scaling(config: NodeGroupScalingConfig) -> NodegroupScalingConfig {
    NodegroupScalingConfig::builder()
        .set_desired_size(config.desired_size)
        .set_max_size(config.max_size)
        .set_min_size(config.min_size)
        .build()
}

fn from_aws(ng: &aws_sdk_eks::types::Nodegroup) -> ObservedNodeGroup {
    ObservedNodeGroup {
        arn: ng.nodegroup_arn().map(str::to_string),
        status: ng
            .status()
            .map(|s| NodeGroupStatusType::from(s.as_str()))
            .unwrap_or_default(),
        version: ng.version().map(str::to_string),
        release_version: ng.release_version().map(str::to_string),
        ami_type: ng.ami_type().map(|t| t.as_str().to_string()),
        disk_size: ng.disk_size(),
        instance_types: ng.instance_types().to_vec(),
        labels: to_btree_map(ng.labels()),
        remote_access: ng.remote_access().map(|r| RemoteAccessConfig {
            ec2_ssh_key: r.ec2_ssh_key().map(str::to_string),
            source_security_groups: r.source_security_groups().to_vec(),
        }),
        scaling_config: ng.scaling_config().map(|s| NodeGroupScalingConfig {
            desired_size: s.desired_size(),
            max_size: s.max_size(),
            min_size: s.min_size(),
        }),
        tags: to_btree_map(ng.tags()),
        created_at: to_chrono(ng.created_at()),
        modified_at: to_chrono(ng.modified_at()),
        health: NodeGroupHealth {
            issues: ng
                .health()
                .map(|h| {
                    h.issues()
                        .iter()
                        .map(|i| Issue {
                            code: i.code().map(|c| c.as_str().to_string()),
                            message: i.message().map(str::to_string),
                            resource_ids: i.resource_ids().to_vec(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        },
        resources: ng
            .resources()
            .map(|r| NodeGroupResources {
                auto_scaling_groups: r
                    .auto_scaling_groups()
                    .iter()
                    .map(|g| AutoScalingGroup {
                        name: g.name().map(str::to_string),
                    })
                    .collect(),
                remote_access_security_group: r.remote_access_security_group().map(str::to_string),
            })
            .unwrap_or_default(),
    }
}

#[async_trait]
impl NodeGroupClient for EksClient {
    async fn describe(&self, cluster: &str, name: &str) -> Result<ObservedNodeGroup, ClientError> {
        let out = self
            .client
            .describe_nodegroup()
            .cluster_name(cluster)
            .nodegroup_name(name)
            .send()
            .await
            .map_err(service_error)?;
        out.nodegroup()
            .map(from_aws)
            .ok_or(ClientError::MissingField("nodegroup"))
    }

    async fn create(&self, input: CreateNodeGroupInput) -> Result<(), ClientError> {
        let p = input.parameters;
        self.client
            .create_nodegroup()
            .cluster_name(input.cluster_name)
            .nodegroup_name(input.node_group_name)
            .node_role(p.node_role)
            .set_subnets(Some(p.subnets))
            .set_ami_type(p.ami_type.as_deref().map(AmiTypes::from))
            .set_disk_size(p.disk_size)
            .set_instance_types((!p.instance_types.is_empty()).then_some(p.instance_types))
            .set_labels(to_hash_map(&p.labels))
            .set_release_version(p.release_version)
            .set_remote_access(p.remote_access.map(|r| {
                AwsRemoteAccess::builder()
                    .set_ec2_ssh_key(r.ec2_ssh_key)
                    .set_source_security_groups(
                        (!r.source_security_groups.is_empty()).then_some(r.source_security_groups),
                    )
                    .build()
            }))
            .set_scaling_config(p.scaling_config.map(to_aws_scaling))
            .set_tags(to_hash_map(&p.tags))
            .set_version(p.version)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn update_config(&self, input: UpdateNodeGroupConfigInput) -> Result<(), ClientError> {
        let labels = (!input.add_or_update_labels.is_empty() || !input.remove_labels.is_empty())
            .then(|| {
                UpdateLabelsPayload::builder()
                    .set_add_or_update_labels(to_hash_map(&input.add_or_update_labels))
                    .set_remove_labels(
                        (!input.remove_labels.is_empty()).then(|| input.remove_labels.clone()),
                    )
                    .build()
            });
        self.client
            .update_nodegroup_config()
            .cluster_name(input.cluster_name)
            .nodegroup_name(input.node_group_name)
            .set_labels(labels)
            .set_scaling_config(input.scaling_config.map(to_aws_scaling))
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn update_version(&self, input: UpdateNodeGroupVersionInput) -> Result<(), ClientError> {
        self.client
            .update_nodegroup_version()
            .cluster_name(input.cluster_name)
            .nodegroup_name(input.node_group_name)
            .set_version(input.version)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn delete(&self, cluster: &str, name: &str) -> Result<(), ClientError> {
        self.client
            .delete_nodegroup()
            .cluster_name(cluster)
            .nodegroup_name(name)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn tag(&self, arn: &str, tags: BTreeMap<String, String>) -> Result<(), ClientError> {
        self.client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(tags.into_iter().collect()))
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn untag(&self, arn: &str, keys: Vec<String>) -> Result<(), ClientError> {
        self.client
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(keys))
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }
}

#[must_use]
pub fn is_not_found(err: &ClientError) -> bool {
    err.code() == Some(ERR_CODE_NOT_FOUND)
}

#[must_use]
pub fn generate_create_node_group_input(name: &str, p: &NodeGroupParameters) -> CreateNodeGroupInput {
    CreateNodeGroupInput {
        cluster_name: p.cluster_name.clone(),
        node_group_name: name.to_string(),
        parameters: p.clone(),
    }
}

/// Label changes and, when it differs from EKS, the desired scaling
/// configuration.
#[must_use]
pub fn generate_update_node_group_config_input(
    name: &str,
    p: &NodeGroupParameters,
    ng: &ObservedNodeGroup,
) -> UpdateNodeGroupConfigInput {
    let (add_or_update_labels, remove_labels) = if p.labels.is_empty() {
        (BTreeMap::new(), Vec::new())
    } else {
        diff_tags(&p.labels, &ng.labels)
    };
    let scaling_config = p
        .scaling_config
        .filter(|desired| !scaling_matches(desired, ng.scaling_config.as_ref()));

    UpdateNodeGroupConfigInput {
        cluster_name: p.cluster_name.clone(),
        node_group_name: name.to_string(),
        add_or_update_labels,
        remove_labels,
        scaling_config,
    }
}

/// Status fields reported to the user.
#[must_use]
pub fn generate_node_group_observation(ng: &ObservedNodeGroup) -> NodeGroupObservation {
    NodeGroupObservation {
        created_at: ng.created_at.map(Time),
        health: ng.health.clone(),
        modified_at: ng.modified_at.map(Time),
        node_group_arn: ng.arn.clone(),
        resources: ng.resources.clone(),
        scaling_config: ng.scaling_config,
        status: ng.status,
    }
}

/// Fill unset parameters from the node group EKS reports. Returns true when
/// anything changed.
pub fn late_initialize_node_group(p: &mut NodeGroupParameters, ng: &ObservedNodeGroup) -> bool {
    let mut li = LateInitializer::default();
    li.string(&mut p.ami_type, ng.ami_type.as_deref());
    li.option(&mut p.disk_size, ng.disk_size);
    li.vec(&mut p.instance_types, &ng.instance_types);
    li.map(&mut p.labels, &ng.labels);
    li.option(&mut p.remote_access, ng.remote_access.clone());
    li.option(&mut p.scaling_config, ng.scaling_config);
    li.map(&mut p.tags, &ng.tags);
    li.string(&mut p.release_version, ng.release_version.as_deref());
    li.string(&mut p.version, ng.version.as_deref());
    li.is_changed()
}

fn scaling_matches(desired: &NodeGroupScalingConfig, observed: Option<&NodeGroupScalingConfig>) -> bool {
    let observed = observed.copied().unwrap_or_default();
    let field = |d: Option<i32>, o: Option<i32>| d.is_none() || d == o;
    field(desired.desired_size, observed.desired_size)
        && field(desired.max_size, observed.max_size)
        && field(desired.min_size, observed.min_size)
}

/// Whether the mutable parts of the node group match the parameters.
#[must_use]
pub fn is_node_group_up_to_date(p: &NodeGroupParameters, ng: &ObservedNodeGroup) -> bool {
    if p.tags != ng.tags || p.labels != ng.labels {
        return false;
    }
    if p.version.is_some() && p.version != ng.version {
        return false;
    }
    p.scaling_config
        .as_ref()
        .is_none_or(|desired| scaling_matches(desired, ng.scaling_config.as_ref()))
}
