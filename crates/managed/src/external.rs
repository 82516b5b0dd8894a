//! The Connect/Observe/Create/Update/Delete contract implemented per
//! resource kind.

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::Managed;

/// Result of observing the external resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    /// The external resource exists.
    pub resource_exists: bool,

    /// The external resource matches the desired spec. Ignored when it
    /// does not exist.
    pub resource_up_to_date: bool,

    /// Spec fields were filled from observed values and must be persisted.
    pub resource_late_initialized: bool,
}

impl ExternalObservation {
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn exists(up_to_date: bool) -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            resource_late_initialized: false,
        }
    }

    #[must_use]
    pub fn late_initialized(mut self, changed: bool) -> Self {
        self.resource_late_initialized = changed;
        self
    }
}

/// Result of creating the external resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    /// Create set the external-name annotation; the managed resource must
    /// be persisted.
    pub external_name_assigned: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalUpdate;

/// Produces an [`ExternalClient`] authenticated for a managed resource.
#[async_trait]
pub trait ExternalConnecter<K: Managed>: Send + Sync {
    async fn connect(&self, mg: &K) -> Result<Box<dyn ExternalClient<K>>>;
}

/// Operations on the external resource backing a managed resource.
///
/// Each operation may mutate the managed resource's status, annotations or
/// spec. The reconciler persists those changes.
#[async_trait]
pub trait ExternalClient<K: Managed>: Send + Sync {
    async fn observe(&self, mg: &mut K) -> Result<ExternalObservation>;

    async fn create(&self, mg: &mut K) -> Result<ExternalCreation>;

    async fn update(&self, mg: &mut K) -> Result<ExternalUpdate>;

    async fn delete(&self, mg: &mut K) -> Result<()>;
}
