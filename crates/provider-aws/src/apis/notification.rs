//! SNS topic subscriptions.

use kube::CustomResource;
use managed::{Condition, ResourceSpec};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "notification.aws.cloudplane.io",
    version = "v1alpha1",
    kind = "SNSSubscription",
    root = "SnsSubscription",
    status = "SnsSubscriptionStatus"
)]
#[kube(derive = "PartialEq")]
#[kube(printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#)]
#[kube(printcolumn = r#"{"name":"Synced","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#)]
#[kube(printcolumn = r#"{"name":"Protocol","type":"string","jsonPath":".spec.forProvider.protocol"}"#)]
#[kube(printcolumn = r#"{"name":"Confirmation","type":"string","jsonPath":".status.atProvider.status"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct SnsSubscriptionSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,

    pub for_provider: SnsSubscriptionParameters,
}

/// Desired state of a subscription to an SNS topic.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnsSubscriptionParameters {
    pub topic_arn: String,

    /// Delivery protocol: `http`, `https`, `email`, `email-json`, `sms`,
    /// `sqs`, `application`, `lambda` or `firehose`
    pub protocol: String,

    pub endpoint: String,

    /// JSON retry policy for HTTP/S endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_policy: Option<String>,

    /// JSON filter policy selecting the messages delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_policy: Option<String>,

    /// `true` to deliver messages without the SNS JSON envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_message_delivery: Option<String>,

    /// JSON dead-letter queue policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redrive_policy: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConfirmationStatus {
    ConfirmationPending,
    ConfirmationSuccessful,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnsSubscriptionObservation {
    /// Account that owns the subscription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConfirmationStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_was_authenticated: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnsSubscriptionStatus {
    #[serde(default)]
    pub at_provider: SnsSubscriptionObservation,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

managed::impl_managed!(SnsSubscription, SnsSubscriptionStatus);
