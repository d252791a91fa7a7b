//! Status conditions attached to `WorkerPool` objects.
//!
//! Conditions are keyed by type: a list never holds two conditions of the same type. Updates are
//! expressed as a pure function returning the new list together with whether anything changed, so
//! that callers only persist status when there is something to write.
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a condition, mirroring the k8s `True`/`False`/`Unknown` convention.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Default for ConditionStatus {
    fn default() -> Self {
        ConditionStatus::Unknown
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Decides whether an existing condition whose status already matches may be overwritten.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdatePolicy {
    /// Replace the condition when its reason or message differ.
    UpdateIfChanged,
    /// Leave the condition alone once set, unless its status flips.
    NeverOverwrite,
}

impl UpdatePolicy {
    fn should_update(&self, existing: &PoolCondition, reason: &str, message: &str) -> bool {
        match self {
            UpdatePolicy::UpdateIfChanged => existing.reason != reason || existing.message != message,
            UpdatePolicy::NeverOverwrite => false,
        }
    }
}

/// A typed diagnostic attached to a `WorkerPool`'s status.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoolCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    /// The last time this condition was written, RFC3339.
    pub last_probe_time: Option<String>,
    /// The last time the status of this condition flipped, RFC3339.
    pub last_transition_time: Option<String>,
}

/// Returns the condition of the given type, if present.
pub fn find_condition<'a>(conditions: &'a [PoolCondition], type_: &str) -> Option<&'a PoolCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Sets a condition on a list of conditions, returning the resulting list and whether it differs from the input.
///
/// An absent condition is always added. An existing condition is replaced when its status differs, otherwise the
/// `policy` decides. The returned list is sorted by condition type.
pub fn set_condition(
    conditions: &[PoolCondition],
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    policy: UpdatePolicy,
) -> (Vec<PoolCondition>, bool) {
    let now = Utc::now().to_rfc3339();
    let mut conditions = conditions.to_vec();
    let mut changed = false;

    match conditions.iter_mut().find(|c| c.type_ == type_) {
        None => {
            conditions.push(PoolCondition {
                type_: type_.to_string(),
                status,
                reason: reason.to_string(),
                message: message.to_string(),
                last_probe_time: Some(now.clone()),
                last_transition_time: Some(now),
            });
            changed = true;
        }
        Some(existing) => {
            let status_flipped = existing.status != status;
            if status_flipped || policy.should_update(existing, reason, message) {
                if status_flipped {
                    existing.last_transition_time = Some(now.clone());
                }
                existing.status = status;
                existing.reason = reason.to_string();
                existing.message = message.to_string();
                existing.last_probe_time = Some(now);
                changed = true;
            }
        }
    }

    conditions.sort_by(|a, b| a.type_.cmp(&b.type_));
    (conditions, changed)
}
