//! Reconciles API Gateway v2 authorizers.
//!
//! Authorizers are looked up by name: the external name is the authorizer
//! name, and the id API Gateway assigns is kept in `status.atProvider`.

use std::sync::Arc;

use async_trait::async_trait;
use kube::{Client, ResourceExt};
use managed::{
    external_name, Condition, Error, ExternalClient, ExternalConnecter, ExternalCreation,
    ExternalObservation, ExternalUpdate, Managed, NameAsExternalName, Reconciler, Result,
};
use tracing::{debug, instrument};

use crate::apis::apigatewayv2::Authorizer;
use crate::clients::apigatewayv2::{
    generate_authorizer_observation, is_authorizer_up_to_date, is_not_found,
    late_initialize_authorizer, ApiGatewayClient, ApiGatewayV2Client, AuthorizerRequest,
};
use crate::clients::{sdk_config, Connector, ProviderStore};
use crate::config::ProviderSettings;

pub const ERR_DESCRIBE_FAILED: &str = "cannot describe API Gateway authorizer";
pub const ERR_CREATE_FAILED: &str = "cannot create API Gateway authorizer";
pub const ERR_UPDATE_FAILED: &str = "cannot update API Gateway authorizer";
pub const ERR_DELETE_FAILED: &str = "cannot delete API Gateway authorizer";
pub const ERR_MISSING_ID: &str = "API Gateway authorizer has no observed id";

pub fn setup(client: &Client, settings: &ProviderSettings) -> Reconciler<Authorizer> {
    let connecter = Arc::new(AuthorizerConnector::new(super::provider_store(client)));
    super::new_reconciler(client, connecter, settings).with_initializer(NameAsExternalName)
}

pub struct AuthorizerConnector {
    connector: Connector<Box<dyn ApiGatewayClient>>,
}

impl AuthorizerConnector {
    pub fn new(store: Arc<dyn ProviderStore>) -> Self {
        let connector = Connector::new(store, |conn| async move {
            let config = sdk_config(&conn).await;
            Ok(Box::new(ApiGatewayV2Client::new(&config)) as Box<dyn ApiGatewayClient>)
        });
        Self { connector }
    }
}

#[async_trait]
impl ExternalConnecter<Authorizer> for AuthorizerConnector {
    async fn connect(&self, cr: &Authorizer) -> Result<Box<dyn ExternalClient<Authorizer>>> {
        let region = cr.spec.for_provider.region.as_deref();
        let client = self.connector.connect(cr, region).await?;
        Ok(Box::new(External { client }))
    }
}

pub struct External {
    client: Box<dyn ApiGatewayClient>,
}

impl External {
    fn request(cr: &Authorizer, authorizer_id: Option<&str>) -> AuthorizerRequest {
        AuthorizerRequest {
            authorizer_id: authorizer_id.map(str::to_string),
            name: external_name(cr).unwrap_or_else(|| cr.name_any()),
            parameters: cr.spec.for_provider.clone(),
        }
    }
}

#[async_trait]
impl ExternalClient<Authorizer> for External {
    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn observe(&self, cr: &mut Authorizer) -> Result<ExternalObservation> {
        let Some(name) = external_name(cr) else {
            return Ok(ExternalObservation::absent());
        };

        let items = match self.client.list_authorizers(&cr.spec.for_provider.api_id).await {
            Ok(items) => items,
            Err(e) if is_not_found(&e) => return Ok(ExternalObservation::absent()),
            Err(e) => return Err(Error::wrap(ERR_DESCRIBE_FAILED, e)),
        };
        let Some(observed) = items
            .into_iter()
            .find(|a| a.name.as_deref() == Some(name.as_str()))
        else {
            debug!(%name, "No authorizer with this name");
            return Ok(ExternalObservation::absent());
        };

        let late_initialized = late_initialize_authorizer(&mut cr.spec.for_provider, &observed);
        cr.status.get_or_insert_with(Default::default).at_provider =
            generate_authorizer_observation(&observed);
        cr.set_conditions([Condition::available()]);

        let up_to_date = is_authorizer_up_to_date(&cr.spec.for_provider, &observed);
        Ok(ExternalObservation::exists(up_to_date).late_initialized(late_initialized))
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn create(&self, cr: &mut Authorizer) -> Result<ExternalCreation> {
        cr.set_conditions([Condition::creating()]);
        let id = self
            .client
            .create_authorizer(Self::request(cr, None))
            .await
            .map_err(|e| Error::wrap(ERR_CREATE_FAILED, e))?;
        cr.status
            .get_or_insert_with(Default::default)
            .at_provider
            .authorizer_id = Some(id);
        Ok(ExternalCreation::default())
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn update(&self, cr: &mut Authorizer) -> Result<ExternalUpdate> {
        let id = cr.authorizer_id().ok_or(Error::Message(ERR_MISSING_ID))?;
        self.client
            .update_authorizer(Self::request(cr, Some(id)))
            .await
            .map_err(|e| Error::wrap(ERR_UPDATE_FAILED, e))?;
        Ok(ExternalUpdate)
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn delete(&self, cr: &mut Authorizer) -> Result<()> {
        cr.set_conditions([Condition::deleting()]);
        let Some(id) = cr.authorizer_id() else {
            return Ok(());
        };
        match self
            .client
            .delete_authorizer(&cr.spec.for_provider.api_id, id)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(Error::wrap(ERR_DELETE_FAILED, e)),
        }
    }
}
