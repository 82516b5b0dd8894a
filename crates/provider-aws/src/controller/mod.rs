//! Controllers for the AWS managed resources.
//!
//! Every kind provides a connector that resolves credentials into a service
//! client and an external client implementing Observe/Create/Update/Delete.
//! The shared [`managed::Reconciler`] drives them.

pub mod apimapping;
pub mod authorizer;
pub mod nodegroup;
pub mod snssubscription;

use std::sync::Arc;

use futures::future::join_all;
use kube::{Client, Resource};
use managed::{ExternalConnecter, KubeEventPublisher, KubeManagedApi, Managed, Reconciler};
use tracing::{error, info, instrument};

use crate::clients::{KubeProviderStore, ProviderStore};
use crate::config::{ControllerKind, ProviderSettings};

/// Name reported on Events, e.g. `managed/nodegroup.eks.aws.cloudplane.io`.
#[must_use]
pub fn controller_name<K: Resource<DynamicType = ()>>() -> String {
    format!("managed/{}.{}", K::kind(&()).to_lowercase(), K::group(&()))
}

/// A reconciler wired to the Kubernetes API and Event recorder.
pub(crate) fn new_reconciler<K: Managed>(
    client: &Client,
    connecter: Arc<dyn ExternalConnecter<K>>,
    settings: &ProviderSettings,
) -> Reconciler<K> {
    Reconciler::new(Arc::new(KubeManagedApi::new(client.clone())), connecter)
        .with_events(Arc::new(KubeEventPublisher::new(
            client.clone(),
            &controller_name::<K>(),
        )))
        .with_config(settings.reconciler_config())
}

pub(crate) fn provider_store(client: &Client) -> Arc<dyn ProviderStore> {
    Arc::new(KubeProviderStore::new(client.clone()))
}

/// Run every enabled controller until a shutdown signal is received.
#[instrument(skip_all, fields(concurrency = settings.concurrency))]
pub async fn run_all(client: Client, settings: ProviderSettings) {
    let concurrency = settings.concurrency;
    let mut tasks = Vec::new();

    for kind in ControllerKind::ALL {
        if !settings.is_enabled(kind) {
            info!(%kind, "Controller disabled");
            continue;
        }
        let client = client.clone();
        let task = match kind {
            ControllerKind::NodeGroup => {
                let reconciler = Arc::new(nodegroup::setup(&client, &settings));
                tokio::spawn(managed::run(client, reconciler, concurrency))
            }
            ControllerKind::Authorizer => {
                let reconciler = Arc::new(authorizer::setup(&client, &settings));
                tokio::spawn(managed::run(client, reconciler, concurrency))
            }
            ControllerKind::ApiMapping => {
                let reconciler = Arc::new(apimapping::setup(&client, &settings));
                tokio::spawn(managed::run(client, reconciler, concurrency))
            }
            ControllerKind::SnsSubscription => {
                let reconciler = Arc::new(snssubscription::setup(&client, &settings));
                tokio::spawn(managed::run(client, reconciler, concurrency))
            }
        };
        tasks.push((kind, task));
    }

    let (kinds, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    for (kind, result) in kinds.into_iter().zip(join_all(handles).await) {
        if let Err(e) = result {
            error!(%kind, error = %e, "Controller task failed");
        }
    }
    info!("All controllers stopped");
}
