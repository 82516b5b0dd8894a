//! API Gateway v2 authorizers and custom-domain API mappings.

use kube::CustomResource;
use managed::{Condition, ResourceSpec};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "apigatewayv2.aws.cloudplane.io",
    version = "v1alpha1",
    kind = "Authorizer",
    status = "AuthorizerStatus"
)]
#[kube(derive = "PartialEq")]
#[kube(printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#)]
#[kube(printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#)]
#[kube(printcolumn = r#"{"name":"External-Name","type":"string","jsonPath":".metadata.annotations.cloudplane\\.io/external-name"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,

    pub for_provider: AuthorizerParameters,
}

/// Desired state of an API Gateway v2 authorizer.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerParameters {
    /// Region of the API. Defaults to the ProviderConfig's region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    pub api_id: String,

    pub authorizer_type: AuthorizerType,

    /// Where the caller's identity is read from, e.g.
    /// `$request.header.Authorization`
    pub identity_source: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer_credentials_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer_payload_format_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer_result_ttl_in_seconds: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_simple_responses: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_validation_expression: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_configuration: Option<JwtConfiguration>,
}

/// `REQUEST` for Lambda authorizers, `JWT` for JSON Web Tokens.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum AuthorizerType {
    #[default]
    #[serde(rename = "REQUEST")]
    Request,
    #[serde(rename = "JWT")]
    Jwt,
}

impl AuthorizerType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Jwt => "JWT",
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct JwtConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer_id: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerStatus {
    #[serde(default)]
    pub at_provider: AuthorizerObservation,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

managed::impl_managed!(Authorizer, AuthorizerStatus);

impl Authorizer {
    #[must_use]
    pub fn authorizer_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.at_provider.authorizer_id.as_deref())
    }
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "apigatewayv2.aws.cloudplane.io",
    version = "v1alpha1",
    kind = "APIMapping",
    root = "ApiMapping",
    status = "ApiMappingStatus"
)]
#[kube(derive = "PartialEq")]
#[kube(printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#)]
#[kube(printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#)]
#[kube(printcolumn = r#"{"name":"Domain","type":"string","jsonPath":".spec.forProvider.domainName"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ApiMappingSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,

    pub for_provider: ApiMappingParameters,
}

/// Desired state of an API mapping on a custom domain name.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiMappingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    pub domain_name: String,

    pub api_id: String,

    pub stage: String,

    /// Path under the domain the API is served on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_mapping_key: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiMappingObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_mapping_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiMappingStatus {
    #[serde(default)]
    pub at_provider: ApiMappingObservation,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

managed::impl_managed!(ApiMapping, ApiMappingStatus);

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn authorizer_type_accepts_known_values() {
        let spec: AuthorizerParameters = serde_json::from_value(serde_json::json!({
            "apiId": "a1b2c3",
            "authorizerType": "JWT",
            "identitySource": ["$request.header.Authorization"],
        }))
        .unwrap();
        assert_eq!(spec.authorizer_type, AuthorizerType::Jwt);

        let err = serde_json::from_value::<AuthorizerParameters>(serde_json::json!({
            "apiId": "a1b2c3",
            "authorizerType": "TOKEN",
            "identitySource": [],
        }));
        assert!(err.is_err());
    }

    #[test]
    fn authorizer_type_schema_is_an_enum() {
        let crd = serde_json::to_value(Authorizer::crd()).unwrap();
        let authorizer_type = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]
            ["properties"]["spec"]["properties"]["forProvider"]["properties"]["authorizerType"];
        assert_eq!(authorizer_type["enum"], serde_json::json!(["REQUEST", "JWT"]));
    }
}
