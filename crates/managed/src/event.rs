//! Kubernetes Events emitted while reconciling managed resources.
//!
//! Publishing is fire-and-forget: failures are logged and never fail a
//! reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event about `resource_ref`.
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publisher backed by `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// `controller_name` is reported as the Event's reporting component,
    /// e.g. `managed/nodegroup.eks.aws.cloudplane.io`.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Discards every event.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, shown under REASON in `kubectl get events`.
pub mod reasons {
    pub const CANNOT_INITIALIZE: &str = "CannotInitializeManagedResource";
    pub const CANNOT_CONNECT: &str = "CannotConnectToProvider";
    pub const CANNOT_OBSERVE: &str = "CannotObserveExternalResource";
    pub const CANNOT_CREATE: &str = "CannotCreateExternalResource";
    pub const CANNOT_UPDATE: &str = "CannotUpdateExternalResource";
    pub const CANNOT_DELETE: &str = "CannotDeleteExternalResource";
    pub const CANNOT_UPDATE_MANAGED: &str = "CannotUpdateManagedResource";

    pub const CREATED: &str = "CreatedExternalResource";
    pub const UPDATED: &str = "UpdatedExternalResource";
    pub const DELETED: &str = "DeletedExternalResource";
}

/// Event actions, shown under ACTION in `kubectl get events`.
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const CONNECT: &str = "Connect";
    pub const OBSERVE: &str = "Observe";
    pub const CREATE: &str = "Create";
    pub const UPDATE: &str = "Update";
    pub const DELETE: &str = "Delete";
}
