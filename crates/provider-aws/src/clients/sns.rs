//! SNS subscription client and attribute helpers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use managed::util::{parse_bool, LateInitializer};

use super::{service_error, ClientError};
use crate::apis::notification::{ConfirmationStatus, SnsSubscriptionObservation, SnsSubscriptionParameters};

/// SNS error code for a subscription or topic that does not exist.
pub const ERR_CODE_NOT_FOUND: &str = "NotFound";

pub const ATTR_DELIVERY_POLICY: &str = "DeliveryPolicy";
pub const ATTR_FILTER_POLICY: &str = "FilterPolicy";
pub const ATTR_RAW_MESSAGE_DELIVERY: &str = "RawMessageDelivery";
pub const ATTR_REDRIVE_POLICY: &str = "RedrivePolicy";
pub const ATTR_OWNER: &str = "Owner";
pub const ATTR_PENDING_CONFIRMATION: &str = "PendingConfirmation";
pub const ATTR_CONFIRMATION_WAS_AUTHENTICATED: &str = "ConfirmationWasAuthenticated";

/// Subscription attributes as returned by `GetSubscriptionAttributes`.
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeInput {
    pub topic_arn: String,
    pub protocol: String,
    pub endpoint: String,
    pub return_subscription_arn: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionClient: Send + Sync {
    /// Returns the subscription ARN.
    async fn subscribe(&self, input: SubscribeInput) -> Result<String, ClientError>;

    async fn get_attributes(&self, arn: &str) -> Result<Attributes, ClientError>;

    async fn set_attribute(&self, arn: &str, name: &str, value: &str) -> Result<(), ClientError>;

    async fn unsubscribe(&self, arn: &str) -> Result<(), ClientError>;
}

/// [`SubscriptionClient`] backed by the AWS SDK.
#[derive(Clone)]
pub struct SnsClient {
    client: aws_sdk_sns::Client,
}

impl SnsClient {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sns::Client::new(config),
        }
    }
}

#[async_trait]
impl SubscriptionClient for SnsClient {
    async fn subscribe(&self, input: SubscribeInput) -> Result<String, ClientError> {
        let out = self
            .client
            .subscribe()
            .topic_arn(input.topic_arn)
            .protocol(input.protocol)
            .endpoint(input.endpoint)
            .return_subscription_arn(input.return_subscription_arn)
            .send()
            .await
            .map_err(service_error)?;
        out.subscription_arn()
            .map(str::to_string)
            .ok_or(ClientError::MissingField("subscription ARN"))
    }

    async fn get_attributes(&self, arn: &str) -> Result<Attributes, ClientError> {
        let out = self
            .client
            .get_subscription_attributes()
            .subscription_arn(arn)
            .send()
            .await
            .map_err(service_error)?;
        Ok(out
            .attributes()
            .map(|a| a.clone().into_iter().collect())
            .unwrap_or_default())
    }

    async fn set_attribute(&self, arn: &str, name: &str, value: &str) -> Result<(), ClientError> {
        self.client
            .set_subscription_attributes()
            .subscription_arn(arn)
            .attribute_name(name)
            .attribute_value(value)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }

    async fn unsubscribe(&self, arn: &str) -> Result<(), ClientError> {
        self.client
            .unsubscribe()
            .subscription_arn(arn)
            .send()
            .await
            .map_err(service_error)?;
        Ok(())
    }
}

#[must_use]
pub fn generate_subscribe_input(p: &SnsSubscriptionParameters) -> SubscribeInput {
    SubscribeInput {
        topic_arn: p.topic_arn.clone(),
        protocol: p.protocol.clone(),
        endpoint: p.endpoint.clone(),
        return_subscription_arn: true,
    }
}

#[must_use]
pub fn generate_subscription_observation(attrs: &Attributes) -> SnsSubscriptionObservation {
    let flag = |key: &str| attrs.get(key).and_then(|v| parse_bool(v));
    SnsSubscriptionObservation {
        owner: attrs.get(ATTR_OWNER).filter(|o| !o.is_empty()).cloned(),
        status: flag(ATTR_PENDING_CONFIRMATION).map(|pending| {
            if pending {
                ConfirmationStatus::ConfirmationPending
            } else {
                ConfirmationStatus::ConfirmationSuccessful
            }
        }),
        confirmation_was_authenticated: flag(ATTR_CONFIRMATION_WAS_AUTHENTICATED),
    }
}

pub fn late_initialize_subscription(p: &mut SnsSubscriptionParameters, attrs: &Attributes) -> bool {
    let mut li = LateInitializer::default();
    for (field, key) in policy_fields(p) {
        li.string(field, attrs.get(key).map(String::as_str));
    }
    li.is_changed()
}

fn policy_fields(p: &mut SnsSubscriptionParameters) -> [(&mut Option<String>, &'static str); 4] {
    [
        (&mut p.delivery_policy, ATTR_DELIVERY_POLICY),
        (&mut p.filter_policy, ATTR_FILTER_POLICY),
        (&mut p.raw_message_delivery, ATTR_RAW_MESSAGE_DELIVERY),
        (&mut p.redrive_policy, ATTR_REDRIVE_POLICY),
    ]
}

fn desired_attributes(p: &SnsSubscriptionParameters) -> [(&'static str, &str); 4] {
    [
        (ATTR_DELIVERY_POLICY, p.delivery_policy.as_deref().unwrap_or_default()),
        (ATTR_FILTER_POLICY, p.filter_policy.as_deref().unwrap_or_default()),
        (ATTR_RAW_MESSAGE_DELIVERY, p.raw_message_delivery.as_deref().unwrap_or_default()),
        (ATTR_REDRIVE_POLICY, p.redrive_policy.as_deref().unwrap_or_default()),
    ]
}

/// Attributes whose desired value differs from SNS. Unset parameters count
/// as empty strings, as do missing attributes.
#[must_use]
pub fn changed_subscription_attributes(p: &SnsSubscriptionParameters, attrs: &Attributes) -> Attributes {
    desired_attributes(p)
        .into_iter()
        .filter(|(key, want)| attrs.get(*key).map_or("", String::as_str) != *want)
        .map(|(key, want)| (key.to_string(), want.to_string()))
        .collect()
}

#[must_use]
pub fn is_subscription_up_to_date(p: &SnsSubscriptionParameters, attrs: &Attributes) -> bool {
    changed_subscription_attributes(p, attrs).is_empty()
}

#[must_use]
pub fn is_subscription_not_found(err: &ClientError) -> bool {
    err.code() == Some(ERR_CODE_NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILTER: &str = r#"{"store":["example_corp"]}"#;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn params() -> SnsSubscriptionParameters {
        SnsSubscriptionParameters {
            topic_arn: "arn:aws:sns:us-east-1:123456789012:orders".to_string(),
            protocol: "sqs".to_string(),
            endpoint: "arn:aws:sqs:us-east-1:123456789012:orders-queue".to_string(),
            ..SnsSubscriptionParameters::default()
        }
    }

    #[test]
    fn subscribe_input_requests_arn() {
        let input = generate_subscribe_input(&params());
        assert!(input.return_subscription_arn);
        assert_eq!(input.protocol, "sqs");
        assert_eq!(input.topic_arn, params().topic_arn);
    }

    #[test]
    fn observation() {
        struct Case {
            name: &'static str,
            attrs: Attributes,
            want: SnsSubscriptionObservation,
        }

        let cases = vec![
            Case {
                name: "confirmed",
                attrs: attrs(&[
                    (ATTR_OWNER, "123456789012"),
                    (ATTR_PENDING_CONFIRMATION, "false"),
                    (ATTR_CONFIRMATION_WAS_AUTHENTICATED, "true"),
                ]),
                want: SnsSubscriptionObservation {
                    owner: Some("123456789012".to_string()),
                    status: Some(ConfirmationStatus::ConfirmationSuccessful),
                    confirmation_was_authenticated: Some(true),
                },
            },
            Case {
                name: "pending",
                attrs: attrs(&[(ATTR_PENDING_CONFIRMATION, "1")]),
                want: SnsSubscriptionObservation {
                    status: Some(ConfirmationStatus::ConfirmationPending),
                    ..SnsSubscriptionObservation::default()
                },
            },
            Case {
                name: "unparseable",
                attrs: attrs(&[(ATTR_PENDING_CONFIRMATION, "maybe"), (ATTR_OWNER, "")]),
                want: SnsSubscriptionObservation::default(),
            },
        ];

        for case in cases {
            assert_eq!(generate_subscription_observation(&case.attrs), case.want, "{}", case.name);
        }
    }

    #[test]
    fn late_initialize() {
        let mut p = SnsSubscriptionParameters {
            raw_message_delivery: Some("true".to_string()),
            ..params()
        };
        let observed = attrs(&[
            (ATTR_FILTER_POLICY, FILTER),
            (ATTR_RAW_MESSAGE_DELIVERY, "false"),
            (ATTR_DELIVERY_POLICY, ""),
        ]);

        assert!(late_initialize_subscription(&mut p, &observed));
        assert_eq!(p.filter_policy.as_deref(), Some(FILTER));
        assert_eq!(p.raw_message_delivery.as_deref(), Some("true"));
        assert_eq!(p.delivery_policy, None);
        assert!(!late_initialize_subscription(&mut p, &observed));
    }

    #[test]
    fn changed_attributes() {
        struct Case {
            name: &'static str,
            p: SnsSubscriptionParameters,
            attrs: Attributes,
            want: Attributes,
        }

        let cases = vec![
            Case {
                name: "nothing set",
                p: params(),
                attrs: Attributes::new(),
                want: Attributes::new(),
            },
            Case {
                name: "filter policy added",
                p: SnsSubscriptionParameters {
                    filter_policy: Some(FILTER.to_string()),
                    ..params()
                },
                attrs: Attributes::new(),
                want: attrs(&[(ATTR_FILTER_POLICY, FILTER)]),
            },
            Case {
                name: "raw delivery changed",
                p: SnsSubscriptionParameters {
                    raw_message_delivery: Some("true".to_string()),
                    ..params()
                },
                attrs: attrs(&[(ATTR_RAW_MESSAGE_DELIVERY, "false"), (ATTR_OWNER, "123")]),
                want: attrs(&[(ATTR_RAW_MESSAGE_DELIVERY, "true")]),
            },
            Case {
                name: "redrive policy cleared",
                p: params(),
                attrs: attrs(&[(ATTR_REDRIVE_POLICY, "{}")]),
                want: attrs(&[(ATTR_REDRIVE_POLICY, "")]),
            },
        ];

        for case in cases {
            let got = changed_subscription_attributes(&case.p, &case.attrs);
            assert_eq!(got, case.want, "{}", case.name);
            assert_eq!(
                is_subscription_up_to_date(&case.p, &case.attrs),
                case.want.is_empty(),
                "{}",
                case.name
            );
        }
    }

    #[test]
    fn not_found_by_code() {
        assert!(is_subscription_not_found(&ClientError::service(ERR_CODE_NOT_FOUND, "gone")));
        assert!(!is_subscription_not_found(&ClientError::service("AuthorizationError", "no")));
    }
}
