//! Reconciles SNS topic subscriptions. The external name is the
//! subscription ARN returned by `Subscribe`.

use std::sync::Arc;

use async_trait::async_trait;
use kube::{Client, ResourceExt};
use managed::{
    external_name, set_external_name, Condition, Error, ExternalClient, ExternalConnecter,
    ExternalCreation, ExternalObservation, ExternalUpdate, Managed, Reconciler, Result,
};
use tracing::{debug, instrument};

use crate::apis::notification::{ConfirmationStatus, SnsSubscription};
use crate::clients::sns::{
    changed_subscription_attributes, generate_subscribe_input, generate_subscription_observation,
    is_subscription_not_found, is_subscription_up_to_date, late_initialize_subscription, SnsClient,
    SubscriptionClient,
};
use crate::clients::{sdk_config, Connector, ProviderStore};
use crate::config::ProviderSettings;

pub const ERR_GET_ATTRIBUTES_FAILED: &str = "cannot get SNS subscription attributes";
pub const ERR_SUBSCRIBE_FAILED: &str = "cannot subscribe to SNS topic";
pub const ERR_SET_ATTRIBUTE_FAILED: &str = "cannot set SNS subscription attribute";
pub const ERR_UNSUBSCRIBE_FAILED: &str = "cannot unsubscribe from SNS topic";

pub fn setup(client: &Client, settings: &ProviderSettings) -> Reconciler<SnsSubscription> {
    let connecter = Arc::new(SubscriptionConnector::new(super::provider_store(client)));
    super::new_reconciler(client, connecter, settings)
}

pub struct SubscriptionConnector {
    connector: Connector<Box<dyn SubscriptionClient>>,
}

impl SubscriptionConnector {
    pub fn new(store: Arc<dyn ProviderStore>) -> Self {
        let connector = Connector::new(store, |conn| async move {
            let config = sdk_config(&conn).await;
            Ok(Box::new(SnsClient::new(&config)) as Box<dyn SubscriptionClient>)
        });
        Self { connector }
    }
}

#[async_trait]
impl ExternalConnecter<SnsSubscription> for SubscriptionConnector {
    async fn connect(
        &self,
        cr: &SnsSubscription,
    ) -> Result<Box<dyn ExternalClient<SnsSubscription>>> {
        let client = self.connector.connect(cr, None).await?;
        Ok(Box::new(External { client }))
    }
}

pub struct External {
    client: Box<dyn SubscriptionClient>,
}

#[async_trait]
impl ExternalClient<SnsSubscription> for External {
    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn observe(&self, cr: &mut SnsSubscription) -> Result<ExternalObservation> {
        let Some(arn) = external_name(cr) else {
            return Ok(ExternalObservation::absent());
        };

        let attrs = match self.client.get_attributes(&arn).await {
            Ok(attrs) => attrs,
            Err(e) if is_subscription_not_found(&e) => return Ok(ExternalObservation::absent()),
            Err(e) => return Err(Error::wrap(ERR_GET_ATTRIBUTES_FAILED, e)),
        };

        let late_initialized = late_initialize_subscription(&mut cr.spec.for_provider, &attrs);
        let observation = generate_subscription_observation(&attrs);
        match observation.status {
            Some(ConfirmationStatus::ConfirmationSuccessful) => {
                cr.set_conditions([Condition::available()]);
            }
            Some(ConfirmationStatus::ConfirmationPending) => {
                cr.set_conditions([Condition::creating()]);
            }
            None => debug!("Subscription reports no confirmation status"),
        }
        cr.status.get_or_insert_with(Default::default).at_provider = observation;

        let up_to_date = is_subscription_up_to_date(&cr.spec.for_provider, &attrs);
        Ok(ExternalObservation::exists(up_to_date).late_initialized(late_initialized))
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn create(&self, cr: &mut SnsSubscription) -> Result<ExternalCreation> {
        cr.set_conditions([Condition::creating()]);
        let arn = self
            .client
            .subscribe(generate_subscribe_input(&cr.spec.for_provider))
            .await
            .map_err(|e| Error::wrap(ERR_SUBSCRIBE_FAILED, e))?;
        set_external_name(cr, &arn);
        Ok(ExternalCreation {
            external_name_assigned: true,
        })
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn update(&self, cr: &mut SnsSubscription) -> Result<ExternalUpdate> {
        let Some(arn) = external_name(cr) else {
            return Ok(ExternalUpdate);
        };
        let attrs = self
            .client
            .get_attributes(&arn)
            .await
            .map_err(|e| Error::wrap(ERR_GET_ATTRIBUTES_FAILED, e))?;

        // SNS sets one attribute per call.
        for (name, value) in changed_subscription_attributes(&cr.spec.for_provider, &attrs) {
            debug!(attribute = %name, "Setting subscription attribute");
            self.client
                .set_attribute(&arn, &name, &value)
                .await
                .map_err(|e| Error::wrap(ERR_SET_ATTRIBUTE_FAILED, e))?;
        }
        Ok(ExternalUpdate)
    }

    #[instrument(skip_all, fields(name = %cr.name_any()))]
    async fn delete(&self, cr: &mut SnsSubscription) -> Result<()> {
        cr.set_conditions([Condition::deleting()]);
        let Some(arn) = external_name(cr) else {
            return Ok(());
        };
        match self.client.unsubscribe(&arn).await {
            Ok(()) => Ok(()),
            Err(e) if is_subscription_not_found(&e) => Ok(()),
            Err(e) => Err(Error::wrap(ERR_UNSUBSCRIBE_FAILED, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::notification::{SnsSubscriptionParameters, SnsSubscriptionSpec};
    use crate::clients::sns::{
        Attributes, MockSubscriptionClient, ATTR_FILTER_POLICY, ATTR_OWNER,
        ATTR_PENDING_CONFIRMATION, ATTR_RAW_MESSAGE_DELIVERY, ERR_CODE_NOT_FOUND,
    };
    use crate::clients::ClientError;
    use managed::condition::{equate_conditions, TYPE_READY};
    use managed::ResourceSpec;

    const ARN: &str = "arn:aws:sns:us-east-1:123456789012:orders:6b0e71bd-7e97-4d97-80ce-4a0994e55286";
    const FILTER: &str = r#"{"store":["example_corp"]}"#;

    fn boom() -> ClientError {
        ClientError::service("InternalError", "boom")
    }

    fn subscription(arn: Option<&str>) -> SnsSubscription {
        let mut cr = SnsSubscription::new(
            "orders-to-queue",
            SnsSubscriptionSpec {
                resource_spec: ResourceSpec::default(),
                for_provider: SnsSubscriptionParameters {
                    topic_arn: "arn:aws:sns:us-east-1:123456789012:orders".to_string(),
                    protocol: "sqs".to_string(),
                    endpoint: "arn:aws:sqs:us-east-1:123456789012:orders-queue".to_string(),
                    ..SnsSubscriptionParameters::default()
                },
            },
        );
        if let Some(arn) = arn {
            set_external_name(&mut cr, arn);
        }
        cr
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn external(client: MockSubscriptionClient) -> External {
        External {
            client: Box::new(client),
        }
    }

    #[tokio::test]
    async fn observe() {
        struct Case {
            name: &'static str,
            attrs: std::result::Result<Attributes, ClientError>,
            want: std::result::Result<ExternalObservation, &'static str>,
            want_ready: Option<Condition>,
        }

        let cases = vec![
            Case {
                name: "Confirmed",
                attrs: Ok(attrs(&[(ATTR_OWNER, "123456789012"), (ATTR_PENDING_CONFIRMATION, "false")])),
                want: Ok(ExternalObservation::exists(true)),
                want_ready: Some(Condition::available()),
            },
            Case {
                name: "PendingConfirmation",
                attrs: Ok(attrs(&[(ATTR_PENDING_CONFIRMATION, "true")])),
                want: Ok(ExternalObservation::exists(true)),
                want_ready: Some(Condition::creating()),
            },
            Case {
                name: "LateInitFilterPolicy",
                attrs: Ok(attrs(&[(ATTR_PENDING_CONFIRMATION, "false"), (ATTR_FILTER_POLICY, FILTER)])),
                want: Ok(ExternalObservation::exists(true).late_initialized(true)),
                want_ready: Some(Condition::available()),
            },
            Case {
                name: "NotFound",
                attrs: Err(ClientError::service(ERR_CODE_NOT_FOUND, "no subscription")),
                want: Ok(ExternalObservation::absent()),
                want_ready: None,
            },
            Case {
                name: "Failed",
                attrs: Err(boom()),
                want: Err(ERR_GET_ATTRIBUTES_FAILED),
                want_ready: None,
            },
        ];

        for case in cases {
            let mut client = MockSubscriptionClient::new();
            let result = case.attrs;
            client
                .expect_get_attributes()
                .withf(|arn| arn == ARN)
                .times(1)
                .returning(move |_| result.clone());

            let mut cr = subscription(Some(ARN));
            let got = external(client).observe(&mut cr).await;
            match (got, case.want) {
                (Ok(got), Ok(want)) => assert_eq!(got, want, "{}", case.name),
                (Err(e), Err(want)) => assert_eq!(e.context(), Some(want), "{}", case.name),
                (got, want) => panic!("{}: got {got:?}, want {want:?}", case.name),
            }
            let ready: Vec<Condition> = cr.condition(TYPE_READY).cloned().into_iter().collect();
            let want_ready: Vec<Condition> = case.want_ready.into_iter().collect();
            assert!(equate_conditions(&ready, &want_ready), "{}: {ready:?}", case.name);
        }
    }

    #[tokio::test]
    async fn observe_without_external_name() {
        let got = external(MockSubscriptionClient::new())
            .observe(&mut subscription(None))
            .await
            .unwrap();
        assert_eq!(got, ExternalObservation::absent());
    }

    #[tokio::test]
    async fn create_assigns_subscription_arn() {
        let mut client = MockSubscriptionClient::new();
        client
            .expect_subscribe()
            .withf(|input| input.return_subscription_arn && input.protocol == "sqs")
            .times(1)
            .returning(|_| Ok(ARN.to_string()));
        let mut cr = subscription(None);
        let got = external(client).create(&mut cr).await.unwrap();
        assert!(got.external_name_assigned);
        assert_eq!(external_name(&cr).as_deref(), Some(ARN));

        let mut client = MockSubscriptionClient::new();
        client.expect_subscribe().returning(|_| Err(boom()));
        let err = external(client).create(&mut subscription(None)).await.unwrap_err();
        assert_eq!(err.context(), Some(ERR_SUBSCRIBE_FAILED));
    }

    #[tokio::test]
    async fn update_sets_changed_attributes() {
        let mut client = MockSubscriptionClient::new();
        client
            .expect_get_attributes()
            .returning(|_| Ok(attrs(&[(ATTR_RAW_MESSAGE_DELIVERY, "false"), (ATTR_FILTER_POLICY, FILTER)])));
        client
            .expect_set_attribute()
            .withf(|arn, name, value| arn == ARN && name == ATTR_RAW_MESSAGE_DELIVERY && value == "true")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut cr = subscription(Some(ARN));
        cr.spec.for_provider.raw_message_delivery = Some("true".to_string());
        cr.spec.for_provider.filter_policy = Some(FILTER.to_string());
        assert!(external(client).update(&mut cr).await.is_ok());
    }

    #[tokio::test]
    async fn update_failures() {
        let mut client = MockSubscriptionClient::new();
        client.expect_get_attributes().returning(|_| Err(boom()));
        let err = external(client)
            .update(&mut subscription(Some(ARN)))
            .await
            .unwrap_err();
        assert_eq!(err.context(), Some(ERR_GET_ATTRIBUTES_FAILED));

        let mut client = MockSubscriptionClient::new();
        client
            .expect_get_attributes()
            .returning(|_| Ok(attrs(&[(ATTR_FILTER_POLICY, FILTER)])));
        client.expect_set_attribute().returning(|_, _, _| Err(boom()));
        let err = external(client)
            .update(&mut subscription(Some(ARN)))
            .await
            .unwrap_err();
        assert_eq!(err.context(), Some(ERR_SET_ATTRIBUTE_FAILED));
    }

    #[tokio::test]
    async fn delete() {
        struct Case {
            name: &'static str,
            result: std::result::Result<(), ClientError>,
            want_err: Option<&'static str>,
        }

        let cases = vec![
            Case {
                name: "Successful",
                result: Ok(()),
                want_err: None,
            },
            Case {
                name: "AlreadyDeleted",
                result: Err(ClientError::service(ERR_CODE_NOT_FOUND, "gone")),
                want_err: None,
            },
            Case {
                name: "Failed",
                result: Err(boom()),
                want_err: Some(ERR_UNSUBSCRIBE_FAILED),
            },
        ];

        for case in cases {
            let mut client = MockSubscriptionClient::new();
            let result = case.result;
            client
                .expect_unsubscribe()
                .withf(|arn| arn == ARN)
                .times(1)
                .returning(move |_| result.clone());
            let mut cr = subscription(Some(ARN));
            let got = external(client).delete(&mut cr).await;
            assert_eq!(got.err().and_then(|e| e.context()), case.want_err, "{}", case.name);
            assert!(equate_conditions(cr.conditions(), &[Condition::deleting()]));
        }
    }
}
