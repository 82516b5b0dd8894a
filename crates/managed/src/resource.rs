//! The managed-resource contract shared by every resource kind.

use std::collections::BTreeMap;
use std::fmt::Debug;

use kube::{Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::condition::{self, Condition};

/// Annotation holding the cloud-side identifier of a managed resource.
pub const ANNOTATION_EXTERNAL_NAME: &str = "cloudplane.io/external-name";

/// Finalizer held on every managed resource until its external resource
/// has been deleted or orphaned.
pub const FINALIZER: &str = "finalizer.managedresource.cloudplane.io";

pub const TAG_KIND: &str = "cloudplane-kind";
pub const TAG_NAME: &str = "cloudplane-name";
pub const TAG_PROVIDER_CONFIG: &str = "cloudplane-provider-config";

/// Reference to the cluster-scoped `ProviderConfig` holding credentials.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct ProviderConfigReference {
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
        }
    }
}

/// What happens to the external resource when the managed resource is
/// deleted.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

/// Fields common to every managed resource spec. Flattened into each kind's
/// spec next to `forProvider`.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,

    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// A Kubernetes resource that represents an external cloud resource.
///
/// Implement with [`impl_managed!`](crate::impl_managed) for kinds whose spec
/// flattens a [`ResourceSpec`] and whose status carries `conditions`.
pub trait Managed:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn resource_spec(&self) -> &ResourceSpec;

    fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        condition::set_conditions(self.conditions_mut(), conditions);
    }

    fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions().iter().find(|c| c.type_ == type_)
    }

    fn provider_config_ref(&self) -> &ProviderConfigReference {
        &self.resource_spec().provider_config_ref
    }

    fn deletion_policy(&self) -> DeletionPolicy {
        self.resource_spec().deletion_policy
    }
}

/// Implement [`Managed`] for a custom resource whose spec has a flattened
/// `resource_spec: ResourceSpec` and whose status is an `Option<S>` with a
/// `conditions: Vec<Condition>` field.
#[macro_export]
macro_rules! impl_managed {
    ($kind:ty, $status:ty) => {
        impl $crate::resource::Managed for $kind {
            fn conditions(&self) -> &[$crate::condition::Condition] {
                self.status
                    .as_ref()
                    .map_or(&[][..], |s| s.conditions.as_slice())
            }

            fn conditions_mut(&mut self) -> &mut Vec<$crate::condition::Condition> {
                &mut self
                    .status
                    .get_or_insert_with(<$status as ::std::default::Default>::default)
                    .conditions
            }

            fn resource_spec(&self) -> &$crate::resource::ResourceSpec {
                &self.spec.resource_spec
            }
        }
    };
}

/// The external name of `mg`, if set and non-empty.
pub fn external_name<K: Resource>(mg: &K) -> Option<String> {
    mg.meta()
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_EXTERNAL_NAME))
        .filter(|name| !name.is_empty())
        .cloned()
}

pub fn set_external_name<K: Resource>(mg: &mut K, name: &str) {
    mg.annotations_mut()
        .insert(ANNOTATION_EXTERNAL_NAME.to_string(), name.to_string());
}

/// Add [`FINALIZER`] to `mg`. Returns true when it was missing.
pub fn add_finalizer<K: Resource>(mg: &mut K) -> bool {
    let finalizers = mg.finalizers_mut();
    if finalizers.iter().any(|f| f == FINALIZER) {
        return false;
    }
    finalizers.push(FINALIZER.to_string());
    true
}

/// Remove [`FINALIZER`] from `mg`. Returns true when it was present.
pub fn remove_finalizer<K: Resource>(mg: &mut K) -> bool {
    let finalizers = mg.finalizers_mut();
    let before = finalizers.len();
    finalizers.retain(|f| f != FINALIZER);
    finalizers.len() != before
}

pub fn is_deleting<K: Resource>(mg: &K) -> bool {
    mg.meta().deletion_timestamp.is_some()
}

/// Default tags identifying the managed resource that owns an external
/// resource.
pub fn external_tags<K: Managed>(mg: &K) -> BTreeMap<String, String> {
    let kind = format!("{}.{}", K::kind(&()).to_lowercase(), K::group(&()));
    BTreeMap::from([
        (TAG_KIND.to_string(), kind),
        (TAG_NAME.to_string(), mg.name_any()),
        (
            TAG_PROVIDER_CONFIG.to_string(),
            mg.provider_config_ref().name.clone(),
        ),
    ])
}

#[cfg(test)]
pub(crate) mod testing {
    //! A minimal managed resource for runtime tests.

    use super::ResourceSpec;
    use crate::condition::Condition;
    use kube::CustomResource;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};

    #[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
    #[kube(
        group = "test.cloudplane.io",
        version = "v1alpha1",
        kind = "Widget",
        status = "WidgetStatus"
    )]
    #[serde(rename_all = "camelCase")]
    pub struct WidgetSpec {
        #[serde(flatten)]
        pub resource_spec: ResourceSpec,
        #[serde(default)]
        pub size: Option<i32>,
        #[serde(default)]
        pub tags: std::collections::BTreeMap<String, String>,
    }

    #[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
    pub struct WidgetStatus {
        #[serde(default)]
        pub conditions: Vec<Condition>,
    }

    crate::impl_managed!(Widget, WidgetStatus);

    pub fn widget(name: &str) -> Widget {
        Widget::new(name, WidgetSpec::default())
    }
}
