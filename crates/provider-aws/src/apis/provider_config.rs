//! `ProviderConfig`: where a managed resource gets its AWS credentials.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Region and credentials used to reach AWS.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(group = "aws.cloudplane.io", version = "v1alpha1", kind = "ProviderConfig")]
#[kube(derive = "PartialEq")]
#[kube(printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#)]
#[kube(printcolumn = r#"{"name":"Source","type":"string","jsonPath":".spec.credentials.source"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct ProviderConfigSpec {
    /// Default AWS region for clients built from this config
    pub region: String,

    #[serde(default)]
    pub credentials: ProviderCredentials,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    #[serde(default)]
    pub source: CredentialsSource,

    /// Secret key holding a shared-credentials file. Required when
    /// `source` is `Secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum CredentialsSource {
    /// Read an INI credentials document from a Kubernetes Secret
    #[default]
    Secret,
    /// Use the ambient AWS credential chain (environment, IRSA, instance
    /// profile)
    InjectedIdentity,
}

/// A key within a namespaced Secret.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct SecretKeySelector {
    pub namespace: String,
    pub name: String,
    pub key: String,
}
