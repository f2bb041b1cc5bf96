use std::collections::BTreeMap;

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Well-known condition types. The map in [`Conditions`] is keyed by this
/// enum, so each type has exactly one writer and one slot.
#[derive(
    Deserialize,
    Serialize,
    Clone,
    Copy,
    Debug,
    JsonSchema,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionType {
    /// Aggregate condition mirroring the service conditions below it.
    Ready,
    /// Health of the nova sub-component, owned by the nova reconciler.
    NovaReady,
    /// Fallback for condition keys written by older or newer versions;
    /// keeps status deserialization from failing on them.
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionReason {
    Ready,
    Requested,
    Error,
}

/// Operator concern attached to a non-true condition. Absent on true
/// conditions; serialized as an explicit `null` so a status merge patch
/// clears the stored key when a condition flips to true.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct Condition {
    pub status: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ConditionReason>,
    pub severity: Option<ConditionSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        rename = "lastTransitionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(
        status: ConditionStatus,
        reason: Option<ConditionReason>,
        severity: Option<ConditionSeverity>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            reason,
            severity,
            message: Some(message.into()),
            last_transition_time: Some(Utc::now().to_rfc3339()),
        }
    }

    /// Two conditions carry the same state when everything but the
    /// transition time matches.
    pub fn same_state(&self, other: &Condition) -> bool {
        self.status == other.status
            && self.reason == other.reason
            && self.severity == other.severity
            && self.message == other.message
    }
}

/// Condition collection keyed by type. `set` is last-write-wins per type,
/// except that writing a condition equal in state to the stored one keeps
/// the stored entry (and its transition time) untouched, so repeated
/// reconciliation leaves the status byte-stable.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(transparent)]
pub struct Conditions(BTreeMap<ConditionType, Condition>);

impl Conditions {
    pub fn get(&self, type_: ConditionType) -> Option<&Condition> {
        self.0.get(&type_)
    }

    pub fn set(&mut self, type_: ConditionType, condition: Condition) {
        if let Some(existing) = self.0.get(&type_) {
            if existing.same_state(&condition) {
                return;
            }
        }
        self.0.insert(type_, condition);
    }

    pub fn mark_true(&mut self, type_: ConditionType, message: &str) {
        self.set(
            type_,
            Condition::new(
                ConditionStatus::True,
                Some(ConditionReason::Ready),
                None,
                message,
            ),
        );
    }

    pub fn mark_false(
        &mut self,
        type_: ConditionType,
        reason: ConditionReason,
        severity: ConditionSeverity,
        message: &str,
    ) {
        self.set(
            type_,
            Condition::new(
                ConditionStatus::False,
                Some(reason),
                Some(severity),
                message,
            ),
        );
    }

    pub fn is_true(&self, type_: ConditionType) -> bool {
        self.get(type_)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConditionType, &Condition)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested(message: &str, time: &str) -> Condition {
        Condition {
            status: ConditionStatus::False,
            reason: Some(ConditionReason::Requested),
            severity: Some(ConditionSeverity::Info),
            message: Some(message.to_string()),
            last_transition_time: Some(time.to_string()),
        }
    }

    #[test]
    fn set_keeps_one_condition_per_type() {
        let mut conds = Conditions::default();
        conds.set(ConditionType::NovaReady, requested("first", "t1"));
        conds.set(
            ConditionType::NovaReady,
            Condition::new(
                ConditionStatus::False,
                Some(ConditionReason::Error),
                Some(ConditionSeverity::Warning),
                "second",
            ),
        );

        assert_eq!(conds.iter().count(), 1);
        let stored = conds.get(ConditionType::NovaReady).unwrap();
        assert_eq!(stored.reason, Some(ConditionReason::Error));
        assert_eq!(stored.message.as_deref(), Some("second"));
    }

    #[test]
    fn set_preserves_transition_time_when_state_unchanged() {
        let mut conds = Conditions::default();
        conds.set(ConditionType::NovaReady, requested("waiting", "t1"));
        conds.set(ConditionType::NovaReady, requested("waiting", "t2"));

        let stored = conds.get(ConditionType::NovaReady).unwrap();
        assert_eq!(stored.last_transition_time.as_deref(), Some("t1"));
    }

    #[test]
    fn set_replaces_condition_when_state_changes() {
        let mut conds = Conditions::default();
        conds.set(ConditionType::NovaReady, requested("waiting", "t1"));
        conds.mark_true(ConditionType::NovaReady, "done");

        let stored = conds.get(ConditionType::NovaReady).unwrap();
        assert_eq!(stored.status, ConditionStatus::True);
        assert_ne!(stored.last_transition_time.as_deref(), Some("t1"));
        assert!(conds.is_true(ConditionType::NovaReady));
    }

    #[test]
    fn mark_true_drops_severity() {
        let mut conds = Conditions::default();
        conds.mark_false(
            ConditionType::NovaReady,
            ConditionReason::Error,
            ConditionSeverity::Warning,
            "boom",
        );
        conds.mark_true(ConditionType::NovaReady, "done");

        let stored = conds.get(ConditionType::NovaReady).unwrap();
        assert_eq!(stored.severity, None);
        assert_eq!(stored.reason, Some(ConditionReason::Ready));
    }

    #[test]
    fn foreign_condition_keys_deserialize_to_fallback() {
        let v = serde_json::json!({
            "GlanceReady": { "status": "True" },
            "NovaReady": { "status": "False", "reason": "Requested" },
        });
        let conds: Conditions = serde_json::from_value(v).unwrap();
        assert!(conds.get(ConditionType::Unknown).is_some());
        assert!(!conds.is_true(ConditionType::NovaReady));
    }

    #[test]
    fn true_condition_serializes_explicit_null_severity() {
        let mut conds = Conditions::default();
        conds.mark_true(ConditionType::NovaReady, "done");

        let v = serde_json::to_value(&conds).unwrap();
        let cond = v["NovaReady"].as_object().unwrap();
        // The key must be present and null; an omitted key would survive
        // a merge patch and leave a stale severity on the server.
        assert!(cond.contains_key("severity"));
        assert!(cond["severity"].is_null());
    }

    #[test]
    fn serializes_as_type_keyed_object() {
        let mut conds = Conditions::default();
        conds.set(ConditionType::NovaReady, requested("waiting", "t1"));

        let v = serde_json::to_value(&conds).unwrap();
        assert_eq!(v["NovaReady"]["status"], "False");
        assert_eq!(v["NovaReady"]["reason"], "Requested");
        assert_eq!(v["NovaReady"]["severity"], "Info");
        assert_eq!(v["NovaReady"]["lastTransitionTime"], "t1");
    }
}
