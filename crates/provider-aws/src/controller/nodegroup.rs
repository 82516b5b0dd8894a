//! Reconciles EKS managed node groups.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::{Client, ResourceExt};
use managed::util::diff_tags;
use managed::{
    external_name, Condition, Error, ExternalClient, ExternalConnecter, ExternalCreation,
    ExternalObservation, ExternalUpdate, Managed, NameAsExternalName, Reconciler, Result, Tagger,
};
use tracing::{debug, instrument};

use crate::apis::eks::{NodeGroup, NodeGroupObservation, NodeGroupStatusType};
use crate::clients::eks::{
    generate_create_node_group_input, generate_node_group_observation,
    generate_update_node_group_config_input, is_node_group_up_to_date, is_not_found,
    late_initialize_node_group, EksClient, NodeGroupClient, UpdateNodeGroupVersionInput,
};
use crate::clients::{sdk_config, ClientError, Connector, ProviderStore};
use crate::config::ProviderSettings;

pub const ERR_DESCRIBE_FAILED: &str = "cannot describe EKS node group";
pub const ERR_CREATE_FAILED: &str = "cannot create EKS node group";
pub const ERR_UPDATE_CONFIG_FAILED: &str = "cannot update EKS node group config";
pub const ERR_UPDATE_VERSION_FAILED: &str = "cannot update EKS node group version";
pub const ERR_ADD_TAGS_FAILED: &str = "cannot add tags to EKS node group";
pub const ERR_REMOVE_TAGS_FAILED: &str = "cannot remove tags from EKS node group";
pub const ERR_DELETE_FAILED: &str = "cannot delete EKS node group";

/// Build the node group reconciler.
pub fn setup(client: &Client, settings: &ProviderSettings) -> Reconciler<NodeGroup> {
    let connecter = Arc::new(NodeGroupConnector::new(super::provider_store(client)));
    super::new_reconciler(client, connecter, settings)
        .with_initializer(NameAsExternalName)
        .with_initializer(Tagger::new(node_group_tags))
}

fn node_group_tags(cr: &mut NodeGroup) -> &mut BTreeMap<String, String> {
    &mut cr.spec.for_provider.tags
}

pub struct NodeGroupConnector {
    connector: Connector<Box<dyn NodeGroupClient>>,
}

impl NodeGroupConnector {
    pub fn new(store: Arc<dyn ProviderStore>) -> Self {
        let connector = Connector::new(store, |conn| async move {
            let config = sdk_config(&conn).await;
            Ok(Box::new(EksClient::new(&config)) as Box<dyn NodeGroupClient>)
        });
        Self { connector }
    }
}

#[async_trait]
impl ExternalConnecter<NodeGroup> for NodeGroupConnector {
    async fn connect(&self, cr: &NodeGroup) -> Result<Box<dyn ExternalClient<NodeGroup>>> {
        let client = self.connector.connect(cr, None).await?;
        Ok(Box::new(External { client }))
    }
}

pub struct External {
    client: Box<dyn NodeGroupClient>,
}

#[async_trait]
impl ExternalClient<NodeGroup> for External {
    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn observe(&self, cr: &mut NodeGroup) -> Result<ExternalObservation> {
        let Some(name) = external_name(cr) else {
            return Ok(ExternalObservation::absent());
        };

        let ng = match self
            .client
            .describe(&cr.spec.for_provider.cluster_name, &name)
            .await
        {
            Ok(ng) => ng,
            Err(e) if is_not_found(&e) => {
                // A stale CREATING would otherwise suppress the next create.
                if let Some(status) = cr.status.as_mut() {
                    status.at_provider = NodeGroupObservation::default();
                }
                return Ok(ExternalObservation::absent());
            }
            Err(e) => return Err(Error::wrap(ERR_DESCRIBE_FAILED, e)),
        };

        let late_initialized = late_initialize_node_group(&mut cr.spec.for_provider, &ng);
        cr.status.get_or_insert_with(Default::default).at_provider =
            generate_node_group_observation(&ng);

        let ready = match ng.status {
            NodeGroupStatusType::Active => Condition::available(),
            NodeGroupStatusType::Creating => Condition::creating(),
            NodeGroupStatusType::Deleting => Condition::deleting(),
            _ => Condition::unavailable(),
        };
        cr.set_conditions([ready]);
        debug!(status = %ng.status, "Observed node group");

        let up_to_date = is_node_group_up_to_date(&cr.spec.for_provider, &ng);
        Ok(ExternalObservation::exists(up_to_date).late_initialized(late_initialized))
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn create(&self, cr: &mut NodeGroup) -> Result<ExternalCreation> {
        cr.set_conditions([Condition::creating()]);
        if cr.observed_status() == NodeGroupStatusType::Creating {
            return Ok(ExternalCreation::default());
        }

        let name = external_name(cr).unwrap_or_else(|| cr.name_any());
        self.client
            .create(generate_create_node_group_input(&name, &cr.spec.for_provider))
            .await
            .map_err(|e| Error::wrap(ERR_CREATE_FAILED, e))?;
        Ok(ExternalCreation::default())
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn update(&self, cr: &mut NodeGroup) -> Result<ExternalUpdate> {
        if cr.observed_status() == NodeGroupStatusType::Updating {
            return Ok(ExternalUpdate);
        }

        let name = external_name(cr).unwrap_or_else(|| cr.name_any());
        let p = &cr.spec.for_provider;
        let ng = self
            .client
            .describe(&p.cluster_name, &name)
            .await
            .map_err(|e| Error::wrap(ERR_DESCRIBE_FAILED, e))?;

        let (add, remove) = diff_tags(&p.tags, &ng.tags);
        let arn = match ng.arn.as_deref() {
            Some(arn) if !arn.is_empty() => arn,
            _ if add.is_empty() && remove.is_empty() => "",
            _ => {
                return Err(Error::wrap(
                    ERR_DESCRIBE_FAILED,
                    ClientError::MissingField("node group ARN"),
                ))
            }
        };
        if !remove.is_empty() {
            self.client
                .untag(arn, remove)
                .await
                .map_err(|e| Error::wrap(ERR_REMOVE_TAGS_FAILED, e))?;
        }
        if !add.is_empty() {
            self.client
                .tag(arn, add)
                .await
                .map_err(|e| Error::wrap(ERR_ADD_TAGS_FAILED, e))?;
        }

        // EKS rejects config changes while a version update is in flight.
        if p.version.is_some() && p.version != ng.version {
            self.client
                .update_version(UpdateNodeGroupVersionInput {
                    cluster_name: p.cluster_name.clone(),
                    node_group_name: name,
                    version: p.version.clone(),
                })
                .await
                .map_err(|e| Error::wrap(ERR_UPDATE_VERSION_FAILED, e))?;
            return Ok(ExternalUpdate);
        }

        let input = generate_update_node_group_config_input(&name, p, &ng);
        if !input.is_empty() {
            self.client
                .update_config(input)
                .await
                .map_err(|e| Error::wrap(ERR_UPDATE_CONFIG_FAILED, e))?;
        }
        Ok(ExternalUpdate)
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn delete(&self, cr: &mut NodeGroup) -> Result<()> {
        cr.set_conditions([Condition::deleting()]);
        if cr.observed_status() == NodeGroupStatusType::Deleting {
            return Ok(());
        }

        let name = external_name(cr).unwrap_or_else(|| cr.name_any());
        match self
            .client
            .delete(&cr.spec.for_provider.cluster_name, &name)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::wrap(ERR_DELETE_FAILED, e)),
        }
    }
}
