use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, instrument};

use crate::crd::conditions::{
    ConditionReason, ConditionSeverity, ConditionType,
};
use crate::crd::control_plane::ControlPlane;
use crate::crd::nova::NovaSpec;
use crate::store::{
    NovaStore, ObjectIdentity, OperationResult, OwnerIdentity, StoreError,
};

use super::ReconcileErr;

/// Fixed name of the dependent object; one nova per namespace.
pub const NOVA_NAME: &str = "nova";

pub const NOVA_READY_MESSAGE: &str = "nova deployment completed";
pub const NOVA_RUNNING_MESSAGE: &str = "nova deployment in progress";
pub const NOVA_ERROR_PREFIX: &str = "nova reconciliation error:";

/// Desired nova spec for a control plane. The template wins wholesale; any
/// drift on the dependent is overwritten on the next pass.
// TODO: default each cell to a dedicated message bus instance; cells that
// share one bus currently see each other's traffic.
pub fn project(template: &NovaSpec) -> NovaSpec {
    template.clone()
}

/// Reconcile the nova section of `instance` against the store and record
/// the outcome in the `NovaReady` condition. Store failures are both
/// reflected in the condition and returned, so the caller's scheduler can
/// retry while observers see the failure.
#[instrument(skip_all, fields(
    ns = %instance.namespace().unwrap_or_else(|| "default".into()),
    name = %instance.name_any(),
))]
pub async fn reconcile_nova(
    instance: &mut ControlPlane,
    store: &dyn NovaStore,
) -> Result<Action, ReconcileErr> {
    if !instance.spec.nova.enabled {
        debug!("nova disabled; skipping");
        return Ok(Action::await_change());
    }

    let id = ObjectIdentity::new(
        NOVA_NAME,
        &instance.namespace().unwrap_or_else(|| "default".into()),
    );
    let owner = owner_identity(instance);
    let desired = project(&instance.spec.nova.template);

    let op = match store.apply(&id, desired, &owner).await {
        Ok(op) => op,
        Err(e) => {
            mark_error(instance, &e);
            return Err(e.into());
        }
    };
    if op != OperationResult::Unchanged {
        info!(ns = %id.namespace, name = %id.name, "nova {}", op);
    }

    let ready = match store.get(&id).await {
        Ok(nova) => nova.map(|n| n.is_ready()).unwrap_or(false),
        Err(e) => {
            mark_error(instance, &e);
            return Err(e.into());
        }
    };

    if ready {
        instance
            .conditions_mut()
            .mark_true(ConditionType::NovaReady, NOVA_READY_MESSAGE);
    } else {
        instance.conditions_mut().mark_false(
            ConditionType::NovaReady,
            ConditionReason::Requested,
            ConditionSeverity::Info,
            NOVA_RUNNING_MESSAGE,
        );
    }

    Ok(Action::await_change())
}

fn owner_identity(cp: &ControlPlane) -> OwnerIdentity {
    OwnerIdentity {
        api_version: ControlPlane::api_version(&()).to_string(),
        kind: ControlPlane::kind(&()).to_string(),
        name: cp.name_any(),
        uid: cp.meta().uid.clone().unwrap_or_default(),
    }
}

fn mark_error(instance: &mut ControlPlane, err: &StoreError) {
    instance.conditions_mut().mark_false(
        ConditionType::NovaReady,
        ConditionReason::Error,
        ConditionSeverity::Warning,
        &format!("{} {}", NOVA_ERROR_PREFIX, err),
    );
}
