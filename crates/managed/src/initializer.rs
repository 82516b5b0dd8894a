//! Initializers run on every reconcile before the external client is
//! connected.

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::resource::{external_name, external_tags, set_external_name, Managed};

/// Mutates a managed resource before reconciliation. Returns true when the
/// resource changed and must be persisted.
pub trait Initializer<K: Managed>: Send + Sync {
    fn initialize(&self, mg: &mut K) -> bool;
}

/// Defaults the external name to `metadata.name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAsExternalName;

impl<K: Managed> Initializer<K> for NameAsExternalName {
    fn initialize(&self, mg: &mut K) -> bool {
        if external_name(mg).is_some() {
            return false;
        }
        let name = mg.name_any();
        set_external_name(mg, &name);
        true
    }
}

/// Merges the default tags into a kind-specific tag map.
pub struct Tagger<K> {
    tags: fn(&mut K) -> &mut BTreeMap<String, String>,
}

impl<K> Tagger<K> {
    /// `tags` returns the spec field default tags are merged into.
    pub fn new(tags: fn(&mut K) -> &mut BTreeMap<String, String>) -> Self {
        Self { tags }
    }
}

impl<K: Managed> Initializer<K> for Tagger<K> {
    fn initialize(&self, mg: &mut K) -> bool {
        let defaults = external_tags(mg);
        let tags = (self.tags)(mg);
        let mut changed = false;
        for (key, value) in defaults {
            if tags.get(&key) != Some(&value) {
                tags.insert(key, value);
                changed = true;
            }
        }
        changed
    }
}
