//! API Gateway v2 authorizer and API mapping client.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_apigatewayv2::types::{
    AuthorizerType as AwsAuthorizerType, JwtConfiguration as AwsJwtConfiguration,
};
use managed::util::LateInitializer;

use super::{service_error, ClientError};
use crate::apis::apigatewayv2::{
    ApiMappingObservation, ApiMappingParameters, AuthorizerObservation, AuthorizerParameters,
    JwtConfiguration,
};

/// API Gateway error code for a missing API, authorizer, domain or mapping.
pub const ERR_CODE_NOT_FOUND: &str = "NotFoundException";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedAuthorizer {
    pub authorizer_id: Option<String>,
    pub name: Option<String>,
    pub authorizer_type: Option<String>,
    pub identity_source: Vec<String>,
    pub authorizer_credentials_arn: Option<String>,
    pub authorizer_payload_format_version: Option<String>,
    pub authorizer_result_ttl_in_seconds: Option<i32>,
    pub authorizer_uri: Option<String>,
    pub enable_simple_responses: Option<bool>,
    pub identity_validation_expression: Option<String>,
    pub jwt_configuration: Option<JwtConfiguration>,
}

/// Create or update request for an authorizer. `authorizer_id` is only set
/// for updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorizerRequest {
    pub authorizer_id: Option<String>,
    pub name: String,
    pub parameters: AuthorizerParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedApiMapping {
    pub api_id: Option<String>,
    pub api_mapping_id: Option<String>,
    pub api_mapping_key: Option<String>,
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiMappingRequest {
    pub api_mapping_id: Option<String>,
    pub domain_name: String,
    pub api_id: String,
    pub stage: String,
    pub api_mapping_key: Option<String>,
}

/// Operations on API Gateway v2 authorizers and API mappings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiGatewayClient: Send + Sync {
    /// All authorizers of an API, following pagination.
    async fn list_authorizers(&self, api_id: &str) -> Result<Vec<ObservedAuthorizer>, ClientError>;

    /// Returns the new authorizer's id.
    async fn create_authorizer(&self, req: AuthorizerRequest) -> Result<String, ClientError>;

    async fn update_authorizer(&self, req: AuthorizerRequest) -> Result<(), ClientError>;

    async fn delete_authorizer(&self, api_id: &str, authorizer_id: &str) -> Result<(), ClientError>;

    /// All API mappings of a custom domain, following pagination.
    async fn list_api_mappings(&self, domain_name: &str) -> Result<Vec<ObservedApiMapping>, ClientError>;

    /// Returns the new mapping's id.
    async fn create_api_mapping(&self, req: ApiMappingRequest) -> Result<String, ClientError>;

    async fn update_api_mapping(&self, req: ApiMappingRequest) -> Result<(), ClientError>;

    async fn delete_api_mapping(&self, domain_name: &str, api_mapping_id: &str) -> Result<(), ClientError>;
}

/// [`ApiGatewayClient`] backed by the AWS SDK.
#[derive(Clone)]
pub struct ApiGatewayV2Client {
    client: aws_sdk_apigatewayv2::Client,
}

impl ApiGatewayV2Client {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_apigatewayv2::Client::new(config),
        }
    }
}

fn non_empty<T>(v: Vec<T>) -> Option<Vec<T>> {
    (!v.is_empty()).then_some(v)
}

fn to_aws_jwt(jwt: Option<JwtConfiguration>) -> Option<AwsJwtConfiguration> {
    jwt.map(|j| {
        AwsJwtConfiguration::builder()
            .set_audience(non_empty(j.audience))
            .set_issuer(j.issuer)
            .build()
    })
}

fn from_aws_authorizer(a: &aws_sdk_apigatewayv2::types::Authorizer) -> ObservedAuthorizer {
    ObservedAuthorizer {
        authorizer_id: a.authorizer_id().map(str::to_string),
        name: a.name().map(str::to_string),
        authorizer_type: a.authorizer_type().map(|t| t.as_str().to_string()),
        identity_source: a.identity_source().to_vec(),
        authorizer_credentials_arn: a.authorizer_credentials_arn().map(str::to_string),
        authorizer_payload_format_version: a.authorizer_payload_format_version().map(str::to_string),
        authorizer_result_ttl_in_seconds: a.authorizer_result_ttl_in_seconds(),
        authorizer_uri: a.authorizer_uri().map(str::to_string),
        enable_simple_responses: a.enable_simple_responses(),
        identity_validation_expression: a.identity_validation_expression().map(str::to_string),
        jwt_configuration: a.jwt_configuration().map(|j| JwtConfiguration {
            audience: j.audience().to_vec(),
            issuer: j.issuer().map(str::to_string),
        }),
    }
}

#[async_trait]
impl ApiGatewayClient for ApiGatewayV2Client {
    async fn list_authorizers(&self, api_id: &str) -> Result<Vec<ObservedAuthorizer>, ClientError> {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let out = self
                .client
                .get_authorizers()
                .api_id(api_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(service_error)?;
            items.extend(out.items().iter().map(from_aws_authorizer));
            match out.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => return Ok(items),
            }
        }
    }

    async fn create_authorizer(&self, req: AuthorizerRequest) -> Result<String, ClientError> {
        let p = req.parameters;
        let out = self
            .client
            .create_authorizer()
            .api_id(p.api_id)
            .name(req.name)
            .authorizer_type(AwsAuthorizerType::from(p.authorizer_type.as_str()))
            .set_identity_source(Some(p.identity_source))
            .set_authorizer_credentials_arn(p.authorizer_credentials_arn)
            .set_authorizer_payload_format_version(p.authorizer_payload_format_version)
            .set_authorizer_result_ttl_in_seconds(p.authorizer_result_ttl_in_seconds)
            .set_authorizer_uri(p.authorizer_uri)
            .set_enable_simple_responses(p.enable_simple_responses)
            .set_identity_validation_expression(p.identity_validation_expression)
            .set_jwt_configuration(to_aws_jwt(p.jwt_configuration))
            .send()
            .await
            .map_err(service_error)?;
        out.authorizer_id()
            .map(str::to_string)
            .ok_or(ClientError::MissingField("authorizer id"))
    }

    async fn update_authorizer(&self, req: AuthorizerRequest) -> Result<(), ClientError> {
        let p = req.parameters;
        self.client
            .update_authorizer()
            .api_id(p.api_id)
            .set_authorizer_id(req.authorizer_id)
            .name(req.name)
            .authorizer_type(AwsAuthorizerType::from(p.authorizer_type.as_str()))
            .set_identity_source(Some(p.identity_source))
            .set_authorizer_credentials_arn(p.authorizer_credentials_arn)
            .set_authorizer_payload_format_version(p.authorizer_payload_format_version)
            .set_authorizer_result_ttl_in_seconds(p.authorizer_result_ttl_in_seconds)
            .set_authorizer_uri(p.authorizer_uri)
            .set_enable_simple_responses(p.enable_simple_responses)
            .set_identity_validation_expression(p.identity_validation_expression)
            .set_jwt_configuration(to_aws_jwt(p.jwt_configuration))
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn delete_authorizer(&self, api_id: &str, authorizer_id: &str) -> Result<(), ClientError> {
        self.client
            .delete_authorizer()
            .api_id(api_id)
            .authorizer_id(authorizer_id)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn list_api_mappings(&self, domain_name: &str) -> Result<Vec<ObservedApiMapping>, ClientError> {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let out = self
                .client
                .get_api_mappings()
                .domain_name(domain_name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(service_error)?;
            items.extend(out.items().iter().map(|m| ObservedApiMapping {
                api_id: m.api_id().map(str::to_string),
                api_mapping_id: m.api_mapping_id().map(str::to_string),
                api_mapping_key: m.api_mapping_key().map(str::to_string),
                stage: m.stage().map(str::to_string),
            }));
            match out.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => return Ok(items),
            }
        }
    }

    async fn create_api_mapping(&self, req: ApiMappingRequest) -> Result<String, ClientError> {
        let out = self
            .client
            .create_api_mapping()
            .domain_name(req.domain_name)
            .api_id(req.api_id)
            .stage(req.stage)
            .set_api_mapping_key(req.api_mapping_key)
            .send()
            .await
            .map_err(service_error)?;
        out.api_mapping_id()
            .map(str::to_string)
            .ok_or(ClientError::MissingField("API mapping id"))
    }

    async fn update_api_mapping(&self, req: ApiMappingRequest) -> Result<(), ClientError> {
        self.client
            .update_api_mapping()
            .set_api_mapping_id(req.api_mapping_id)
            .domain_name(req.domain_name)
            .api_id(req.api_id)
            .stage(req.stage)
            .set_api_mapping_key(req.api_mapping_key)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn delete_api_mapping(&self, domain_name: &str, api_mapping_id: &str) -> Result<(), ClientError> {
        self.client
            .delete_api_mapping()
            .domain_name(domain_name)
            .api_mapping_id(api_mapping_id)
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
pub fn generate_authorizer_observation(a: &ObservedAuthorizer) -> AuthorizerObservation {
    AuthorizerObservation {
        authorizer_id: a.authorizer_id.clone(),
    }
}

/// Fill unset optional parameters from the authorizer API Gateway reports.
pub fn late_initialize_authorizer(p: &mut AuthorizerParameters, a: &ObservedAuthorizer) -> bool {
    let mut li = LateInitializer::default();
    li.string(&mut p.authorizer_credentials_arn, a.authorizer_credentials_arn.as_deref());
    li.string(
        &mut p.authorizer_payload_format_version,
        a.authorizer_payload_format_version.as_deref(),
    );
    li.option(&mut p.authorizer_result_ttl_in_seconds, a.authorizer_result_ttl_in_seconds);
    li.string(&mut p.authorizer_uri, a.authorizer_uri.as_deref());
    li.option(&mut p.enable_simple_responses, a.enable_simple_responses);
    li.string(
        &mut p.identity_validation_expression,
        a.identity_validation_expression.as_deref(),
    );
    li.option(&mut p.jwt_configuration, a.jwt_configuration.clone());
    li.is_changed()
}

fn matches<T: PartialEq>(desired: Option<&T>, observed: Option<&T>) -> bool {
    desired.is_none_or(|d| Some(d) == observed)
}

/// Unset optional parameters are not compared.
#[must_use]
pub fn is_authorizer_up_to_date(p: &AuthorizerParameters, a: &ObservedAuthorizer) -> bool {
    a.authorizer_type.as_deref() == Some(p.authorizer_type.as_str())
        && p.identity_source == a.identity_source
        && matches(p.authorizer_credentials_arn.as_ref(), a.authorizer_credentials_arn.as_ref())
        && matches(
            p.authorizer_payload_format_version.as_ref(),
            a.authorizer_payload_format_version.as_ref(),
        )
        && matches(
            p.authorizer_result_ttl_in_seconds.as_ref(),
            a.authorizer_result_ttl_in_seconds.as_ref(),
        )
        && matches(p.authorizer_uri.as_ref(), a.authorizer_uri.as_ref())
        && matches(p.enable_simple_responses.as_ref(), a.enable_simple_responses.as_ref())
        && matches(
            p.identity_validation_expression.as_ref(),
            a.identity_validation_expression.as_ref(),
        )
        && matches(p.jwt_configuration.as_ref(), a.jwt_configuration.as_ref())
}

#[must_use]
pub fn generate_api_mapping_request(id: Option<&str>, p: &ApiMappingParameters) -> ApiMappingRequest {
    ApiMappingRequest {
        api_mapping_id: id.map(str::to_string),
        domain_name: p.domain_name.clone(),
        api_id: p.api_id.clone(),
        stage: p.stage.clone(),
        api_mapping_key: p.api_mapping_key.clone(),
    }
}

#[must_use]
pub fn generate_api_mapping_observation(m: &ObservedApiMapping) -> ApiMappingObservation {
    ApiMappingObservation {
        api_id: m.api_id.clone(),
        api_mapping_id: m.api_mapping_id.clone(),
        stage: m.stage.clone(),
    }
}

pub fn late_initialize_api_mapping(p: &mut ApiMappingParameters, m: &ObservedApiMapping) -> bool {
    let mut li = LateInitializer::default();
    li.string(&mut p.api_mapping_key, m.api_mapping_key.as_deref());
    li.is_changed()
}

/// An unset key matches an empty one.
#[must_use]
pub fn is_api_mapping_up_to_date(p: &ApiMappingParameters, m: &ObservedApiMapping) -> bool {
    m.api_id.as_deref() == Some(p.api_id.as_str())
        && m.stage.as_deref() == Some(p.stage.as_str())
        && p.api_mapping_key.as_deref().unwrap_or_default()
            == m.api_mapping_key.as_deref().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::apigatewayv2::AuthorizerType;

    fn params() -> AuthorizerParameters {
        AuthorizerParameters {
            api_id: "a1b2c3".to_string(),
            authorizer_type: AuthorizerType::Jwt,
            identity_source: vec!["$request.header.Authorization".to_string()],
            jwt_configuration: Some(JwtConfiguration {
                audience: vec!["web".to_string()],
                issuer: Some("https://issuer.example.com".to_string()),
            }),
            ..AuthorizerParameters::default()
        }
    }

    fn observed() -> ObservedAuthorizer {
        ObservedAuthorizer {
            authorizer_id: Some("auth-1".to_string()),
            name: Some("jwt".to_string()),
            authorizer_type: Some("JWT".to_string()),
            identity_source: vec!["$request.header.Authorization".to_string()],
            authorizer_payload_format_version: Some("2.0".to_string()),
            jwt_configuration: params().jwt_configuration,
            ..ObservedAuthorizer::default()
        }
    }

    #[test]
    fn not_found_by_code() {
        assert!(is_not_found(&ClientError::service(ERR_CODE_NOT_FOUND, "gone")));
        assert!(!is_not_found(&ClientError::service("ConflictException", "busy")));
    }

    #[test]
    fn authorizer_up_to_date() {
        struct Case {
            name: &'static str,
            p: AuthorizerParameters,
            want: bool,
        }

        let cases = vec![
            Case {
                name: "same",
                p: params(),
                want: true,
            },
            Case {
                name: "type differs",
                p: AuthorizerParameters {
                    authorizer_type: AuthorizerType::Request,
                    ..params()
                },
                want: false,
            },
            Case {
                name: "identity source differs",
                p: AuthorizerParameters {
                    identity_source: vec!["$request.querystring.token".to_string()],
                    ..params()
                },
                want: false,
            },
            Case {
                name: "payload version differs",
                p: AuthorizerParameters {
                    authorizer_payload_format_version: Some("1.0".to_string()),
                    ..params()
                },
                want: false,
            },
            Case {
                name: "jwt audience differs",
                p: AuthorizerParameters {
                    jwt_configuration: Some(JwtConfiguration {
                        audience: vec!["mobile".to_string()],
                        issuer: Some("https://issuer.example.com".to_string()),
                    }),
                    ..params()
                },
                want: false,
            },
        ];

        for case in cases {
            assert_eq!(is_authorizer_up_to_date(&case.p, &observed()), case.want, "{}", case.name);
        }
    }

    #[test]
    fn authorizer_late_init() {
        let mut p = params();
        assert!(late_initialize_authorizer(&mut p, &observed()));
        assert_eq!(p.authorizer_payload_format_version.as_deref(), Some("2.0"));
        assert!(!late_initialize_authorizer(&mut p, &observed()));
        assert_eq!(
            generate_authorizer_observation(&observed()).authorizer_id.as_deref(),
            Some("auth-1")
        );
    }

    #[test]
    fn api_mapping() {
        let mut p = ApiMappingParameters {
            domain_name: "api.example.com".to_string(),
            api_id: "a1b2c3".to_string(),
            stage: "prod".to_string(),
            ..ApiMappingParameters::default()
        };
        let m = ObservedApiMapping {
            api_id: Some("a1b2c3".to_string()),
            api_mapping_id: Some("map-1".to_string()),
            api_mapping_key: Some("v1".to_string()),
            stage: Some("prod".to_string()),
        };

        assert!(!is_api_mapping_up_to_date(&p, &m));
        assert!(late_initialize_api_mapping(&mut p, &m));
        assert_eq!(p.api_mapping_key.as_deref(), Some("v1"));
        assert!(is_api_mapping_up_to_date(&p, &m));

        let unkeyed = ObservedApiMapping {
            api_mapping_key: Some(String::new()),
            ..m.clone()
        };
        let mut p_unkeyed = ApiMappingParameters {
            api_mapping_key: None,
            ..p.clone()
        };
        assert!(!late_initialize_api_mapping(&mut p_unkeyed, &unkeyed));
        assert!(is_api_mapping_up_to_date(&p_unkeyed, &unkeyed));

        let stale = ApiMappingParameters {
            stage: "dev".to_string(),
            ..p.clone()
        };
        assert!(!is_api_mapping_up_to_date(&stale, &m));

        let o = generate_api_mapping_observation(&m);
        assert_eq!(o.api_mapping_id.as_deref(), Some("map-1"));
        assert_eq!(o.stage.as_deref(), Some("prod"));

        let req = generate_api_mapping_request(Some("map-1"), &p);
        assert_eq!(req.api_mapping_id.as_deref(), Some("map-1"));
        assert_eq!(req.domain_name, "api.example.com");
        assert_eq!(req.api_mapping_key.as_deref(), Some("v1"));
    }
}
