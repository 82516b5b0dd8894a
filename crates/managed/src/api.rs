//! Writes of managed resources back to the Kubernetes API.

use async_trait::async_trait;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;

use crate::resource::Managed;

/// Persists changes the reconciler made to a managed resource.
#[async_trait]
pub trait ManagedApi<K: Managed>: Send + Sync {
    /// Replace metadata and spec. Fails on a stale `resourceVersion`.
    async fn update(&self, mg: &K) -> Result<K, kube::Error>;

    /// Merge-patch the status subresource.
    async fn update_status(&self, mg: &K) -> Result<K, kube::Error>;
}

/// [`ManagedApi`] for a cluster-scoped kind.
pub struct KubeManagedApi<K> {
    api: Api<K>,
}

impl<K: Managed> KubeManagedApi<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl<K: Managed> ManagedApi<K> for KubeManagedApi<K> {
    async fn update(&self, mg: &K) -> Result<K, kube::Error> {
        self.api
            .replace(&mg.name_any(), &PostParams::default(), mg)
            .await
    }

    async fn update_status(&self, mg: &K) -> Result<K, kube::Error> {
        let status = serde_json::to_value(mg)
            .map_err(kube::Error::SerdeError)?
            .get("status")
            .cloned()
            .unwrap_or_default();
        self.api
            .patch_status(
                &mg.name_any(),
                &PatchParams::default(),
                &Patch::Merge(json!({ "status": status })),
            )
            .await
    }
}
