use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::conditions::Conditions;
use super::nova::NovaSpec;

/// Composite control plane resource. Each sub-section declares one managed
/// service; the controller reconciles every enabled section into its own
/// dependent resource and reports per-service conditions.
#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default,
)]
#[kube(
    group = "ostk.io",
    version = "v1alpha1",
    kind = "ControlPlane",
    plural = "controlplanes",
    namespaced,
    status = "ControlPlaneStatus"
)]
pub struct ControlPlaneSpec {
    /// Nova compute service section.
    #[serde(default)]
    pub nova: NovaSection,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct NovaSection {
    /// When false the nova service is skipped entirely; an existing
    /// dependent is left alone.
    #[serde(default)]
    pub enabled: bool,
    /// Desired nova spec, copied onto the dependent object as-is.
    #[serde(default)]
    pub template: NovaSpec,
}

#[derive(
    Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq,
)]
pub struct ControlPlaneStatus {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ControlPlane {
    pub fn conditions(&self) -> Option<&Conditions> {
        self.status.as_ref().map(|s| &s.conditions)
    }

    /// Condition collection, initializing an empty status on first use.
    pub fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self
            .status
            .get_or_insert_with(ControlPlaneStatus::default)
            .conditions
    }
}
