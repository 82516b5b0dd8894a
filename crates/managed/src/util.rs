//! Helpers shared by external clients: late initialization, tag diffs and
//! AWS-style boolean parsing.

use std::collections::BTreeMap;

/// Returns `current` when set, otherwise `observed`.
pub fn late_init<T>(current: Option<T>, observed: Option<T>) -> Option<T> {
    current.or(observed)
}

/// Fills unset spec fields from observed values and records whether any
/// field changed.
///
/// ```
/// use managed::util::LateInitializer;
///
/// let mut version = None;
/// let mut li = LateInitializer::default();
/// li.string(&mut version, Some("1.29"));
/// assert_eq!(version.as_deref(), Some("1.29"));
/// assert!(li.is_changed());
/// ```
#[derive(Debug, Default)]
pub struct LateInitializer {
    changed: bool,
}

impl LateInitializer {
    pub fn option<T>(&mut self, current: &mut Option<T>, observed: Option<T>) {
        if current.is_none() && observed.is_some() {
            *current = observed;
            self.changed = true;
        }
    }

    /// Like [`option`](Self::option), but an empty observed string counts
    /// as unset.
    pub fn string(&mut self, current: &mut Option<String>, observed: Option<&str>) {
        self.option(
            current,
            observed.filter(|s| !s.is_empty()).map(str::to_string),
        );
    }

    /// Fills an empty list from a non-empty observed one.
    pub fn vec<T: Clone>(&mut self, current: &mut Vec<T>, observed: &[T]) {
        if current.is_empty() && !observed.is_empty() {
            *current = observed.to_vec();
            self.changed = true;
        }
    }

    /// Fills an empty map from a non-empty observed one.
    pub fn map(&mut self, current: &mut BTreeMap<String, String>, observed: &BTreeMap<String, String>) {
        if current.is_empty() && !observed.is_empty() {
            current.clone_from(observed);
            self.changed = true;
        }
    }

    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }
}

/// Compute the tags to add and the tag keys to remove so that `observed`
/// matches `desired`.
#[must_use]
pub fn diff_tags(
    desired: &BTreeMap<String, String>,
    observed: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let add = desired
        .iter()
        .filter(|(k, v)| observed.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let remove = observed
        .keys()
        .filter(|k| !desired.contains_key(*k))
        .cloned()
        .collect();
    (add, remove)
}

/// Parse a boolean the way AWS attribute values are written.
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
#[must_use]
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
