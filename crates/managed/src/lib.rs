#![allow(clippy::missing_errors_doc, clippy::doc_markdown)]

//! Managed-resource runtime.
//!
//! This crate holds everything a cloud provider needs to turn a set of
//! per-kind external clients into running Kubernetes controllers:
//!
//! - **Resource contract** - the [`Managed`] trait, external names and
//!   default tags
//! - **Conditions** - `Ready` and `Synced` status conditions
//! - **External clients** - the Connect/Observe/Create/Update/Delete
//!   contract each resource kind implements
//! - **Reconciler** - drives the contract on top of `kube::runtime`
//!
//! Watching, queueing and requeue scheduling are left to
//! `kube::runtime::Controller`.

pub mod api;
pub mod condition;
pub mod error;
pub mod event;
pub mod external;
pub mod initializer;
pub mod reconciler;
pub mod resource;
pub mod util;

pub use api::{KubeManagedApi, ManagedApi};
pub use condition::{Condition, ConditionStatus};
pub use error::{BoxError, Error, Result};
pub use event::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
pub use external::{
    ExternalClient, ExternalConnecter, ExternalCreation, ExternalObservation, ExternalUpdate,
};
pub use initializer::{Initializer, NameAsExternalName, Tagger};
pub use reconciler::{run, Reconciler, ReconcilerConfig};
pub use resource::{
    external_name, external_tags, set_external_name, DeletionPolicy, Managed,
    ProviderConfigReference, ResourceSpec,
};
