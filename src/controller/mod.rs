use std::sync::Arc;

use futures_util::StreamExt;
use kube::{
    Client, Resource, ResourceExt,
    api::{Api, Patch, PatchParams},
    runtime::{Controller, controller::Action, watcher::Config},
};
use serde_json::json;
use tracing::{error, info, instrument, trace, warn};

use crate::config::OperatorConfig;
use crate::crd::conditions::{
    Condition, ConditionStatus, ConditionType, Conditions,
};
use crate::crd::control_plane::{ControlPlane, ControlPlaneStatus};
use crate::crd::nova::Nova;
use crate::store::{KubeStore, NovaStore, StoreError};

pub mod nova;

pub const READY_MESSAGE: &str = "control plane ready";

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone)]
pub struct ControllerContext {
    pub client: Client,
    pub cfg: OperatorConfig,
    pub store: Arc<dyn NovaStore>,
}

pub async fn run_controller(
    client: Client,
    cfg: OperatorConfig,
) -> anyhow::Result<()> {
    let store: Arc<dyn NovaStore> = Arc::new(KubeStore::new(
        client.clone(),
        cfg.apply_timeout(),
        &cfg.field_manager,
    ));
    let ctx = Arc::new(ControllerContext {
        client: client.clone(),
        cfg,
        store,
    });

    let api: Api<ControlPlane> = Api::all(client.clone());
    let novas: Api<Nova> = Api::all(client);

    // Watching owned novas re-triggers the parent when their readiness
    // flips, so convergence needs no fixed polling interval.
    Controller::new(api, Config::default())
        .owns(novas, Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((_obj_ref, action)) => {
                    info!("reconciled: requeue={:?}", action)
                }
                Err(e) => error!(error = ?e, "reconcile error"),
            }
        })
        .await;

    Ok(())
}

#[instrument(skip_all, fields(
    ns = %obj.namespace().unwrap_or_else(|| "default".into()),
    name = %obj.name_any(),
))]
async fn reconcile(
    obj: Arc<ControlPlane>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    if obj.meta().deletion_timestamp.is_some() {
        // Dependents are garbage collected through their owner references.
        return Ok(Action::await_change());
    }

    let ns = obj.namespace().unwrap_or_else(|| "default".to_string());
    let name = obj.name_any();

    let mut instance = (*obj).clone();
    let before = instance.status.clone();

    let outcome =
        nova::reconcile_nova(&mut instance, ctx.store.as_ref()).await;

    // Conditions written on the failure path must reach the api server
    // too, so the status patch happens regardless of the outcome.
    aggregate_ready(instance.conditions_mut());
    instance
        .status
        .get_or_insert_with(ControlPlaneStatus::default)
        .observed_generation = instance.metadata.generation;

    if should_patch_status(before.as_ref(), instance.status.as_ref()) {
        let api: Api<ControlPlane> =
            Api::namespaced(ctx.client.clone(), &ns);
        let patch = json!({ "status": instance.status });
        let res = api
            .patch_status(
                &name,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await;
        match (res, &outcome) {
            (Err(e), Err(_)) => {
                // The reconcile failure wins; the status write gets
                // another chance on the retry pass.
                warn!(error = %e, "status patch failed after reconcile error");
            }
            (Err(e), Ok(_)) => return Err(into_internal(e)),
            _ => trace!(%ns, %name, "status patched"),
        }
    } else {
        trace!(%ns, %name, "status unchanged; skipping patch");
    }

    outcome
}

/// Mirror the service conditions into the aggregate `Ready` condition:
/// true only when every service condition is true.
pub(crate) fn aggregate_ready(conditions: &mut Conditions) {
    let blocker = conditions
        .iter()
        .find(|(t, c)| {
            **t != ConditionType::Ready && c.status != ConditionStatus::True
        })
        .map(|(_, c)| c.clone());

    match blocker {
        None => conditions.mark_true(ConditionType::Ready, READY_MESSAGE),
        Some(c) => conditions.set(
            ConditionType::Ready,
            Condition::new(
                c.status,
                c.reason,
                c.severity,
                c.message.unwrap_or_default(),
            ),
        ),
    }
}

fn should_patch_status(
    before: Option<&ControlPlaneStatus>,
    after: Option<&ControlPlaneStatus>,
) -> bool {
    match (before, after) {
        (None, None) => false,
        (Some(b), Some(a)) => b != a,
        _ => true,
    }
}

fn into_internal<E: std::fmt::Display>(e: E) -> ReconcileErr {
    ReconcileErr::Internal(e.to_string())
}

fn error_policy(
    _obj: Arc<ControlPlane>,
    _error: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    Action::requeue(ctx.cfg.error_requeue())
}
