use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Dependent service resource managed by the control plane controller. Its
/// own reconciler (external to this crate) consumes the spec and reports
/// readiness through the status.
#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default,
    PartialEq,
)]
#[kube(
    group = "ostk.io",
    version = "v1alpha1",
    kind = "Nova",
    plural = "novas",
    namespaced,
    status = "NovaStatus",
    derive = "Default",
    derive = "PartialEq"
)]
pub struct NovaSpec {
    /// Container image for the nova services.
    #[serde(default)]
    pub image: String,
    /// Database instance backing the API-level database.
    #[serde(default)]
    pub api_database_instance: String,
    /// Message bus instance used by the API-level services.
    #[serde(default)]
    pub api_message_bus_instance: String,
    /// Keystone instance used for service authentication.
    #[serde(default)]
    pub keystone_instance: String,
    /// Secret holding the service passwords.
    #[serde(default)]
    pub secret: String,
    /// Per-cell configuration, keyed by cell name ("cell0", "cell1", ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cell_templates: BTreeMap<String, NovaCellSpec>,
}

#[derive(
    Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq,
)]
pub struct NovaCellSpec {
    /// Database instance backing this cell.
    #[serde(default)]
    pub cell_database_instance: String,
    /// Message bus instance for this cell.
    #[serde(default)]
    pub cell_message_bus_instance: String,
    /// Whether services in this cell may reach the API database directly.
    #[serde(default)]
    pub has_api_access: bool,
}

#[derive(
    Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq,
)]
pub struct NovaStatus {
    /// Set by the nova reconciler once every service in every cell is up.
    #[serde(default)]
    pub ready: bool,
}

impl Nova {
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().map(|s| s.ready).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_defaults_to_false() {
        let nova = Nova::new("nova", NovaSpec::default());
        assert!(!nova.is_ready());

        let mut nova = nova;
        nova.status = Some(NovaStatus { ready: true });
        assert!(nova.is_ready());
    }
}
