//! Status conditions for managed resources.
//!
//! Every managed resource reports two conditions:
//!
//! - `Ready` - whether the external resource is usable (`Available`,
//!   `Unavailable`, `Creating`, `Deleting`)
//! - `Synced` - whether the last reconcile succeeded (`ReconcileSuccess`,
//!   `ReconcileError`)

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const TYPE_READY: &str = "Ready";
pub const TYPE_SYNCED: &str = "Synced";

pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_CREATING: &str = "Creating";
pub const REASON_DELETING: &str = "Deleting";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";

/// Status of a condition.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A single observation of a managed resource's state.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, `Ready` or `Synced`
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    /// Last time the condition changed status, reason or message
    pub last_transition_time: Time,

    /// Machine-readable reason for the condition's last transition
    pub reason: String,

    /// Human-readable detail, set for errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    fn new(type_: &str, status: ConditionStatus, reason: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status,
            last_transition_time: Time(Utc::now()),
            reason: reason.to_string(),
            message: None,
        }
    }

    /// The external resource is ready for use.
    #[must_use]
    pub fn available() -> Self {
        Self::new(TYPE_READY, ConditionStatus::True, REASON_AVAILABLE)
    }

    /// The external resource exists but is not usable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_UNAVAILABLE)
    }

    /// The external resource is being created.
    #[must_use]
    pub fn creating() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_CREATING)
    }

    /// The external resource is being deleted.
    #[must_use]
    pub fn deleting() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_DELETING)
    }

    /// The last reconcile completed without error.
    #[must_use]
    pub fn reconcile_success() -> Self {
        Self::new(TYPE_SYNCED, ConditionStatus::True, REASON_RECONCILE_SUCCESS)
    }

    /// The last reconcile failed with `err`.
    #[must_use]
    pub fn reconcile_error(err: &dyn std::error::Error) -> Self {
        Self {
            message: Some(err.to_string()),
            ..Self::new(TYPE_SYNCED, ConditionStatus::False, REASON_RECONCILE_ERROR)
        }
    }

    /// Compare two conditions ignoring the transition time.
    #[must_use]
    pub fn equal(&self, other: &Self) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Merge `new` into `conditions`, replacing any condition of the same type.
///
/// A condition identical to the existing one (per [`Condition::equal`]) is
/// left untouched so its transition time is preserved.
pub fn set_conditions(conditions: &mut Vec<Condition>, new: impl IntoIterator<Item = Condition>) {
    for condition in new {
        match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) if existing.equal(&condition) => {}
            Some(existing) => *existing = condition,
            None => conditions.push(condition),
        }
    }
}

/// Returns true when both sets hold the same conditions, ignoring order and
/// transition times.
#[must_use]
pub fn equate_conditions(a: &[Condition], b: &[Condition]) -> bool {
    a.len() == b.len() && a.iter().all(|c| b.iter().any(|o| o.equal(c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn set_conditions_appends_new_types() {
        let mut conditions = Vec::new();
        set_conditions(
            &mut conditions,
            [Condition::available(), Condition::reconcile_success()],
        );
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].type_, TYPE_READY);
        assert_eq!(conditions[1].type_, TYPE_SYNCED);
    }

    #[test]
    fn set_conditions_replaces_same_type() {
        let mut conditions = vec![Condition::creating()];
        set_conditions(&mut conditions, [Condition::available()]);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason, REASON_AVAILABLE);
        assert_eq!(conditions[0].status, ConditionStatus::True);
    }

    #[test]
    fn set_conditions_preserves_transition_time_when_unchanged() {
        let mut old = Condition::available();
        old.last_transition_time = Time(Utc::now() - Duration::hours(1));
        let stamp = old.last_transition_time.clone();

        let mut conditions = vec![old];
        set_conditions(&mut conditions, [Condition::available()]);
        assert_eq!(conditions[0].last_transition_time, stamp);
    }

    #[test]
    fn reconcile_error_carries_message() {
        let err = crate::Error::Message("cannot get provider secret");
        let condition = Condition::reconcile_error(&err);
        assert_eq!(condition.type_, TYPE_SYNCED);
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(
            condition.message.as_deref(),
            Some("cannot get provider secret")
        );
    }

    #[test]
    fn equate_ignores_order_and_time() {
        let a = vec![Condition::available(), Condition::reconcile_success()];
        let b = vec![Condition::reconcile_success(), Condition::available()];
        assert!(equate_conditions(&a, &b));
        assert!(!equate_conditions(&a, &[Condition::available()]));
    }
}
