//! AWS connection plumbing and per-service clients.
//!
//! Each service module defines a narrow client trait over plain data types
//! plus an SDK-backed implementation, so controllers can be tested against
//! mocks without network access.

pub mod apigatewayv2;
pub mod eks;
pub mod sns;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sdk_eks::error::{DisplayErrorContext, ProvideErrorMetadata};
use futures::future::BoxFuture;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use managed::{Error, Managed};
use thiserror::Error;
use tracing::debug;

use crate::apis::provider_config::{CredentialsSource, ProviderConfig};

pub const ERR_GET_PROVIDER_CONFIG: &str = "cannot get provider config";
pub const ERR_GET_PROVIDER_SECRET: &str = "cannot get provider secret";
pub const ERR_READ_CREDENTIALS: &str = "cannot read credentials key from provider secret";
pub const ERR_NEW_CLIENT: &str = "cannot create AWS client";

const DEFAULT_PROFILE: &str = "default";

/// Errors returned by the service clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// AWS rejected the request.
    #[error("{}: {message}", .code.as_deref().unwrap_or("ServiceError"))]
    Service {
        code: Option<String>,
        message: String,
    },

    #[error("invalid credentials: {0}")]
    Credentials(String),

    #[error("response is missing {0}")]
    MissingField(&'static str),
}

impl ClientError {
    /// A service error with the given code, as returned by AWS.
    pub fn service(code: &str, message: impl Into<String>) -> Self {
        Self::Service {
            code: Some(code.to_string()),
            message: message.into(),
        }
    }

    /// The AWS error code, e.g. `ResourceNotFoundException`.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Convert an SDK error into a [`ClientError`], keeping the AWS error code.
pub(crate) fn service_error<E>(err: E) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    ClientError::Service {
        code: err.code().map(str::to_string),
        message: err
            .message()
            .map_or_else(|| DisplayErrorContext(&err).to_string(), str::to_string),
    }
}

/// Static credentials read from a ProviderConfig secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Everything needed to build an AWS service client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub region: String,

    /// Static credentials, or `None` for the ambient credential chain.
    pub credentials: Option<AwsCredentials>,
}

/// Resolve the `[default]` profile of an AWS shared-credentials document
/// with the SDK's own profile parser.
pub async fn load_credentials(data: &[u8]) -> Result<AwsCredentials, ClientError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| ClientError::Credentials("document is not UTF-8".to_string()))?;

    let files = ProfileFiles::builder()
        .with_contents(ProfileFileKind::Credentials, text)
        .build();
    let provider = ProfileFileCredentialsProvider::builder()
        .profile_files(files)
        .profile_name(DEFAULT_PROFILE)
        .build();
    let creds = provider
        .provide_credentials()
        .await
        .map_err(|e| ClientError::Credentials(DisplayErrorContext(&e).to_string()))?;

    Ok(AwsCredentials {
        access_key_id: creds.access_key_id().to_string(),
        secret_access_key: creds.secret_access_key().to_string(),
        session_token: creds.session_token().map(str::to_string),
    })
}

/// Load an SDK configuration for `conn`.
pub async fn sdk_config(conn: &ConnectionConfig) -> SdkConfig {
    let loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(conn.region.clone()));
    let loader = match &conn.credentials {
        Some(creds) => loader.credentials_provider(Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            creds.session_token.clone(),
            None,
            "ProviderConfigSecret",
        )),
        None => loader,
    };
    loader.load().await
}

/// Reads provider configuration from the cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig, kube::Error>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error>;
}

pub struct KubeProviderStore {
    client: Client,
}

impl KubeProviderStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderStore for KubeProviderStore {
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig, kube::Error> {
        Api::<ProviderConfig>::all(self.client.clone()).get(name).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error> {
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
    }
}

/// Builds a service client from a resolved connection.
pub type ClientFactory<C> =
    Arc<dyn Fn(ConnectionConfig) -> BoxFuture<'static, Result<C, ClientError>> + Send + Sync>;

/// Resolves a managed resource's ProviderConfig and credentials into a
/// service client.
pub struct Connector<C> {
    store: Arc<dyn ProviderStore>,
    new_client: ClientFactory<C>,
}

impl<C> Clone for Connector<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            new_client: Arc::clone(&self.new_client),
        }
    }
}

impl<C: 'static> Connector<C> {
    /// `new_client` builds the service client once the ProviderConfig and
    /// its credentials are resolved.
    pub fn new<F, Fut>(store: Arc<dyn ProviderStore>, new_client: F) -> Self
    where
        F: Fn(ConnectionConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, ClientError>> + Send + 'static,
    {
        let new_client: ClientFactory<C> = Arc::new(
            move |conn: ConnectionConfig| -> BoxFuture<'static, Result<C, ClientError>> {
                Box::pin(new_client(conn))
            },
        );
        Self { store, new_client }
    }

    /// Build a client for `mg`. `region` overrides the ProviderConfig's
    /// region when set and non-empty.
    pub async fn connect<K: Managed>(&self, mg: &K, region: Option<&str>) -> managed::Result<C> {
        let name = &mg.provider_config_ref().name;
        let pc = self
            .store
            .get_provider_config(name)
            .await
            .map_err(|e| Error::wrap(ERR_GET_PROVIDER_CONFIG, e))?;

        let conn = self.connection_config(&pc, region).await?;
        debug!(provider_config = %name, region = %conn.region, "Connecting to AWS");
        (self.new_client)(conn)
            .await
            .map_err(|e| Error::wrap(ERR_NEW_CLIENT, e))
    }

    async fn connection_config(
        &self,
        pc: &ProviderConfig,
        region: Option<&str>,
    ) -> managed::Result<ConnectionConfig> {
        let region = region
            .filter(|r| !r.is_empty())
            .unwrap_or(&pc.spec.region)
            .to_string();

        let credentials = match pc.spec.credentials.source {
            CredentialsSource::InjectedIdentity => None,
            CredentialsSource::Secret => {
                let selector = pc
                    .spec
                    .credentials
                    .secret_ref
                    .as_ref()
                    .ok_or(Error::Message(ERR_GET_PROVIDER_SECRET))?;
                let secret = self
                    .store
                    .get_secret(&selector.namespace, &selector.name)
                    .await
                    .map_err(|e| Error::wrap(ERR_GET_PROVIDER_SECRET, e))?;
                let data = secret
                    .data
                    .as_ref()
                    .and_then(|d| d.get(&selector.key))
                    .ok_or(Error::Message(ERR_READ_CREDENTIALS))?;
                Some(
                    load_credentials(&data.0)
                        .await
                        .map_err(|e| Error::wrap(ERR_READ_CREDENTIALS, e))?,
                )
            }
        };

        Ok(ConnectionConfig {
            region,
            credentials,
        })
    }
}
