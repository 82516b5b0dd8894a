//! Custom resource types served by the provider.

pub mod apigatewayv2;
pub mod eks;
pub mod notification;
pub mod provider_config;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

pub use apigatewayv2::{ApiMapping, Authorizer};
pub use eks::NodeGroup;
pub use notification::SnsSubscription;
pub use provider_config::ProviderConfig;

/// Definitions of every custom resource the provider serves.
#[must_use]
pub fn crds() -> Vec<CustomResourceDefinition> {
    vec![
        ProviderConfig::crd(),
        NodeGroup::crd(),
        Authorizer::crd(),
        ApiMapping::crd(),
        SnsSubscription::crd(),
    ]
}
