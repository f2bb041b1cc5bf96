use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::debug;

use super::{
    NovaStore, ObjectIdentity, OperationResult, OwnerIdentity, StoreError,
};
use crate::crd::nova::{Nova, NovaSpec};

/// Kubernetes-backed [`NovaStore`]. Every call runs under a fixed deadline;
/// expiry surfaces as [`StoreError::Cancelled`].
pub struct KubeStore {
    client: Client,
    op_timeout: Duration,
    field_manager: String,
}

impl KubeStore {
    pub fn new(
        client: Client,
        op_timeout: Duration,
        field_manager: &str,
    ) -> Self {
        Self {
            client,
            op_timeout,
            field_manager: field_manager.to_string(),
        }
    }

    fn api(&self, ns: &str) -> Api<Nova> {
        Api::namespaced(self.client.clone(), ns)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl NovaStore for KubeStore {
    async fn get(
        &self,
        id: &ObjectIdentity,
    ) -> Result<Option<Nova>, StoreError> {
        let api = self.api(&id.namespace);
        let name = id.name.clone();
        with_deadline("get", self.op_timeout, async move {
            api.get_opt(&name).await.map_err(map_kube_err)
        })
        .await
    }

    async fn apply(
        &self,
        id: &ObjectIdentity,
        desired: NovaSpec,
        owner: &OwnerIdentity,
    ) -> Result<OperationResult, StoreError> {
        let api = self.api(&id.namespace);
        let pp = self.post_params();
        let name = id.name.clone();
        let owner = owner.clone();
        with_deadline("apply", self.op_timeout, async move {
            create_or_patch(&api, &name, &pp, &owner, |nova: &mut Nova| {
                nova.spec = desired;
            })
            .await
        })
        .await
    }
}

/// Fetch-or-initialize the object at `name`, upsert the controller owner
/// reference, run `mutate`, and commit only when the result differs from
/// the fetched object. Replacing keeps the fetched resourceVersion, so a
/// concurrent writer makes the api server reject ours with a conflict.
pub(crate) async fn create_or_patch<K>(
    api: &Api<K>,
    name: &str,
    pp: &PostParams,
    owner: &OwnerIdentity,
    mutate: impl FnOnce(&mut K),
) -> Result<OperationResult, StoreError>
where
    K: Resource
        + Clone
        + std::fmt::Debug
        + PartialEq
        + Default
        + Serialize
        + DeserializeOwned,
{
    match api.get_opt(name).await.map_err(map_kube_err)? {
        None => {
            let mut obj = K::default();
            obj.meta_mut().name = Some(name.to_string());
            owner.apply_to(obj.meta_mut())?;
            mutate(&mut obj);
            api.create(pp, &obj).await.map_err(map_kube_err)?;
            debug!(%name, "object created");
            Ok(OperationResult::Created)
        }
        Some(current) => {
            let mut desired = current.clone();
            owner.apply_to(desired.meta_mut())?;
            mutate(&mut desired);
            if desired == current {
                return Ok(OperationResult::Unchanged);
            }
            api.replace(name, pp, &desired).await.map_err(map_kube_err)?;
            debug!(%name, "object drifted; replaced");
            Ok(OperationResult::Updated)
        }
    }
}

async fn with_deadline<T, F>(
    what: &str,
    limit: Duration,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Cancelled(format!(
            "{} did not complete within {:?}",
            what, limit
        ))),
    }
}

fn map_kube_err(e: kube::Error) -> StoreError {
    match &e {
        kube::Error::Api(ae) if ae.code == 409 => {
            StoreError::Conflict(ae.message.clone())
        }
        kube::Error::Api(ae) if (400..500).contains(&ae.code) => {
            StoreError::Rejected(ae.message.clone())
        }
        _ => StoreError::Transport(e.to_string()),
    }
}
