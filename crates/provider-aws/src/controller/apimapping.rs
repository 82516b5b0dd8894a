//! Reconciles API Gateway v2 API mappings. The external name is the mapping
//! id assigned on create.

use std::sync::Arc;

use async_trait::async_trait;
use kube::{Client, ResourceExt};
use managed::{
    external_name, set_external_name, Condition, Error, ExternalClient, ExternalConnecter,
    ExternalCreation, ExternalObservation, ExternalUpdate, Managed, Reconciler, Result,
};
use tracing::{debug, info, instrument};

use crate::apis::apigatewayv2::ApiMapping;
use crate::clients::apigatewayv2::{
    generate_api_mapping_observation, generate_api_mapping_request, is_api_mapping_up_to_date,
    is_not_found, late_initialize_api_mapping, ApiGatewayClient, ApiGatewayV2Client,
};
use crate::clients::{sdk_config, Connector, ProviderStore};
use crate::config::ProviderSettings;

pub const ERR_DESCRIBE_FAILED: &str = "cannot describe API Gateway API mapping";
pub const ERR_CREATE_FAILED: &str = "cannot create API Gateway API mapping";
pub const ERR_UPDATE_FAILED: &str = "cannot update API Gateway API mapping";
pub const ERR_DELETE_FAILED: &str = "cannot delete API Gateway API mapping";

pub fn setup(client: &Client, settings: &ProviderSettings) -> Reconciler<ApiMapping> {
    let connecter = Arc::new(ApiMappingConnector::new(super::provider_store(client)));
    super::new_reconciler(client, connecter, settings)
}

pub struct ApiMappingConnector {
    connector: Connector<Box<dyn ApiGatewayClient>>,
}

impl ApiMappingConnector {
    pub fn new(store: Arc<dyn ProviderStore>) -> Self {
        let connector = Connector::new(store, |conn| async move {
            let config = sdk_config(&conn).await;
            Ok(Box::new(ApiGatewayV2Client::new(&config)) as Box<dyn ApiGatewayClient>)
        });
        Self { connector }
    }
}

#[async_trait]
impl ExternalConnecter<ApiMapping> for ApiMappingConnector {
    async fn connect(&self, cr: &ApiMapping) -> Result<Box<dyn ExternalClient<ApiMapping>>> {
        let region = cr.spec.for_provider.region.as_deref();
        let client = self.connector.connect(cr, region).await?;
        Ok(Box::new(External { client }))
    }
}

pub struct External {
    client: Box<dyn ApiGatewayClient>,
}

#[async_trait]
impl ExternalClient<ApiMapping> for External {
    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn observe(&self, cr: &mut ApiMapping) -> Result<ExternalObservation> {
        let Some(id) = external_name(cr) else {
            return Ok(ExternalObservation::absent());
        };

        let items = match self
            .client
            .list_api_mappings(&cr.spec.for_provider.domain_name)
            .await
        {
            Ok(items) => items,
            Err(e) if is_not_found(&e) => return Ok(ExternalObservation::absent()),
            Err(e) => return Err(Error::wrap(ERR_DESCRIBE_FAILED, e)),
        };
        let Some(observed) = items
            .into_iter()
            .find(|m| m.api_mapping_id.as_deref() == Some(id.as_str()))
        else {
            debug!(%id, "API mapping not found on domain");
            return Ok(ExternalObservation::absent());
        };

        let late_initialized = late_initialize_api_mapping(&mut cr.spec.for_provider, &observed);
        cr.status.get_or_insert_with(Default::default).at_provider =
            generate_api_mapping_observation(&observed);
        cr.set_conditions([Condition::available()]);

        let up_to_date = is_api_mapping_up_to_date(&cr.spec.for_provider, &observed);
        Ok(ExternalObservation::exists(up_to_date).late_initialized(late_initialized))
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn create(&self, cr: &mut ApiMapping) -> Result<ExternalCreation> {
        cr.set_conditions([Condition::creating()]);
        let id = self
            .client
            .create_api_mapping(generate_api_mapping_request(None, &cr.spec.for_provider))
            .await
            .map_err(|e| Error::wrap(ERR_CREATE_FAILED, e))?;
        info!(%id, "API mapping created");
        set_external_name(cr, &id);
        Ok(ExternalCreation {
            external_name_assigned: true,
        })
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn update(&self, cr: &mut ApiMapping) -> Result<ExternalUpdate> {
        let id = external_name(cr);
        self.client
            .update_api_mapping(generate_api_mapping_request(id.as_deref(), &cr.spec.for_provider))
            .await
            .map_err(|e| Error::wrap(ERR_UPDATE_FAILED, e))?;
        Ok(ExternalUpdate)
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn delete(&self, cr: &mut ApiMapping) -> Result<()> {
        cr.set_conditions([Condition::deleting()]);
        let Some(id) = external_name(cr) else {
            return Ok(());
        };
        match self
            .client
            .delete_api_mapping(&cr.spec.for_provider.domain_name, &id)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::wrap(ERR_DELETE_FAILED, e)),
        }
    }
}
