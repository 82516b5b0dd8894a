//! Drives the external-client contract for one managed resource kind.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::events::EventType;
use kube::runtime::watcher;
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::api::ManagedApi;
use crate::condition::Condition;
use crate::error::{Error, Result};
use crate::event::{actions, reasons, EventPublisher, NoopEventPublisher};
use crate::external::ExternalConnecter;
use crate::initializer::Initializer;
use crate::resource::{add_finalizer, is_deleting, remove_finalizer, DeletionPolicy, Managed};

/// Requeue timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Wait before re-observing a resource that is up to date.
    pub poll_interval: Duration,

    /// Wait after a create or delete, or after an error.
    pub short_wait: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            short_wait: Duration::from_secs(30),
        }
    }
}

/// Reconciles managed resources of kind `K` against their external
/// resources.
pub struct Reconciler<K: Managed> {
    api: Arc<dyn ManagedApi<K>>,
    connecter: Arc<dyn ExternalConnecter<K>>,
    initializers: Vec<Box<dyn Initializer<K>>>,
    events: Arc<dyn EventPublisher>,
    config: ReconcilerConfig,
}

impl<K: Managed> Reconciler<K> {
    pub fn new(api: Arc<dyn ManagedApi<K>>, connecter: Arc<dyn ExternalConnecter<K>>) -> Self {
        Self {
            api,
            connecter,
            initializers: Vec::new(),
            events: Arc::new(NoopEventPublisher),
            config: ReconcilerConfig::default(),
        }
    }

    /// Run `initializer` before every reconcile of a live resource.
    #[must_use]
    pub fn with_initializer(mut self, initializer: impl Initializer<K> + 'static) -> Self {
        self.initializers.push(Box::new(initializer));
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> ReconcilerConfig {
        self.config
    }

    /// Reconcile one managed resource.
    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
    pub async fn reconcile(&self, obj: Arc<K>) -> Result<Action> {
        if obj.meta().name.is_none() {
            return Err(Error::MissingObjectKey);
        }
        let mut mg = (*obj).clone();
        let deleting = is_deleting(&mg);

        if !deleting {
            let mut changed = false;
            for initializer in &self.initializers {
                changed |= initializer.initialize(&mut mg);
            }
            changed |= add_finalizer(&mut mg);
            if changed {
                if let Err(e) = self.persist(&mut mg).await {
                    return self
                        .fail(
                            &mut mg,
                            Error::UpdateManaged(e),
                            reasons::CANNOT_INITIALIZE,
                            actions::RECONCILE,
                        )
                        .await;
                }
            }
        }

        let client = match self.connecter.connect(&mg).await {
            Ok(client) => client,
            Err(e) => {
                return self
                    .fail(&mut mg, e, reasons::CANNOT_CONNECT, actions::CONNECT)
                    .await
            }
        };

        let observation = match client.observe(&mut mg).await {
            Ok(observation) => observation,
            Err(e) => {
                return self
                    .fail(&mut mg, e, reasons::CANNOT_OBSERVE, actions::OBSERVE)
                    .await
            }
        };
        debug!(?observation, "Observed external resource");

        if deleting {
            if mg.deletion_policy() == DeletionPolicy::Delete && observation.resource_exists {
                if let Err(e) = client.delete(&mut mg).await {
                    return self
                        .fail(&mut mg, e, reasons::CANNOT_DELETE, actions::DELETE)
                        .await;
                }
                info!("Deletion of external resource requested");
                self.publish(&mg, EventType::Normal, reasons::DELETED, actions::DELETE, None)
                    .await;
                return self.succeed(&mut mg, self.config.short_wait).await;
            }

            if remove_finalizer(&mut mg) {
                self.api.update(&mg).await.map_err(Error::RemoveFinalizer)?;
            }
            info!("Managed resource released");
            return Ok(Action::await_change());
        }

        if observation.resource_late_initialized {
            if let Err(e) = self.persist(&mut mg).await {
                return self
                    .fail(
                        &mut mg,
                        Error::UpdateManaged(e),
                        reasons::CANNOT_UPDATE_MANAGED,
                        actions::RECONCILE,
                    )
                    .await;
            }
        }

        if !observation.resource_exists {
            let creation = match client.create(&mut mg).await {
                Ok(creation) => creation,
                Err(e) => {
                    return self
                        .fail(&mut mg, e, reasons::CANNOT_CREATE, actions::CREATE)
                        .await
                }
            };
            if creation.external_name_assigned {
                if let Err(e) = self.persist(&mut mg).await {
                    return self
                        .fail(
                            &mut mg,
                            Error::UpdateManagedAfterCreate(e),
                            reasons::CANNOT_UPDATE_MANAGED,
                            actions::CREATE,
                        )
                        .await;
                }
            }
            info!("External resource created");
            self.publish(&mg, EventType::Normal, reasons::CREATED, actions::CREATE, None)
                .await;
            return self.succeed(&mut mg, self.config.short_wait).await;
        }

        if observation.resource_up_to_date {
            return self.succeed(&mut mg, self.config.poll_interval).await;
        }

        if let Err(e) = client.update(&mut mg).await {
            return self
                .fail(&mut mg, e, reasons::CANNOT_UPDATE, actions::UPDATE)
                .await;
        }
        info!("External resource updated");
        self.publish(&mg, EventType::Normal, reasons::UPDATED, actions::UPDATE, None)
            .await;
        self.succeed(&mut mg, self.config.poll_interval).await
    }

    /// Replace the object and carry the new resource version forward. Status
    /// changes made locally are kept for the following status write.
    async fn persist(&self, mg: &mut K) -> Result<(), kube::Error> {
        let updated = self.api.update(mg).await?;
        mg.meta_mut().resource_version = updated.meta().resource_version.clone();
        Ok(())
    }

    async fn succeed(&self, mg: &mut K, requeue_after: Duration) -> Result<Action> {
        mg.set_conditions([Condition::reconcile_success()]);
        self.api.update_status(mg).await.map_err(Error::UpdateStatus)?;
        Ok(Action::requeue(requeue_after))
    }

    async fn fail(
        &self,
        mg: &mut K,
        err: Error,
        reason: &str,
        action: &str,
    ) -> Result<Action> {
        warn!(error = %err, reason, "Reconcile failed");
        mg.set_conditions([Condition::reconcile_error(&err)]);
        if let Err(e) = self.api.update_status(mg).await {
            warn!(error = %e, "Failed to record reconcile error in status");
        }
        self.publish(mg, EventType::Warning, reason, action, Some(err.to_string()))
            .await;
        Err(err)
    }

    async fn publish(
        &self,
        mg: &K,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events
            .publish(&mg.object_ref(&()), type_, reason, action, note)
            .await;
    }
}

async fn reconcile<K: Managed>(obj: Arc<K>, ctx: Arc<Reconciler<K>>) -> Result<Action> {
    ctx.reconcile(obj).await
}

fn error_policy<K: Managed>(obj: Arc<K>, err: &Error, ctx: Arc<Reconciler<K>>) -> Action {
    error!(error = %err, name = %obj.name_any(), "Reconciliation failed");
    Action::requeue(ctx.config.short_wait)
}

/// Run a controller for every object of kind `K` until a shutdown signal is
/// received.
pub async fn run<K: Managed>(client: Client, reconciler: Arc<Reconciler<K>>, concurrency: u16) {
    let kind = K::kind(&()).to_string();
    info!(%kind, concurrency, "Starting managed resource controller");

    let api: Api<K> = Api::all(client);
    Controller::new(api, watcher::Config::default().any_semantic())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile::<K>, error_policy::<K>, reconciler)
        .for_each(|result| {
            let span = tracing::info_span!("reconciliation_result", %kind);
            async move {
                match result {
                    Ok((obj, action)) => {
                        debug!(name = %obj.name, ?action, "Reconciliation successful");
                    }
                    Err(e) => {
                        debug!(error = %e, "Reconciliation error");
                    }
                }
            }
            .instrument(span)
        })
        .await;

    info!(%kind, "Managed resource controller shutting down");
}
