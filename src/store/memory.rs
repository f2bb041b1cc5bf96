use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::Resource;
use tokio::sync::RwLock;

use super::{
    NovaStore, ObjectIdentity, OperationResult, OwnerIdentity, StoreError,
};
use crate::crd::nova::{Nova, NovaSpec, NovaStatus};

/// In-memory [`NovaStore`] with the same create-or-patch semantics as the
/// Kubernetes-backed one. Tests seed it, flip readiness, inject failures
/// and observe what was written.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Nova>,
    fail_next_apply: Option<StoreError>,
    fail_next_get: Option<StoreError>,
    last_op: Option<OperationResult>,
    applies: usize,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: &ObjectIdentity, nova: Nova) {
        let mut w = self.inner.write().await;
        w.objects.insert(id.key(), nova);
    }

    pub async fn set_ready(&self, id: &ObjectIdentity, ready: bool) {
        let mut w = self.inner.write().await;
        if let Some(nova) = w.objects.get_mut(&id.key()) {
            nova.status = Some(NovaStatus { ready });
        }
    }

    /// Fail the next apply call with `err`, once.
    pub async fn fail_next_apply(&self, err: StoreError) {
        self.inner.write().await.fail_next_apply = Some(err);
    }

    /// Fail the next get call with `err`, once.
    pub async fn fail_next_get(&self, err: StoreError) {
        self.inner.write().await.fail_next_get = Some(err);
    }

    pub async fn stored(&self, id: &ObjectIdentity) -> Option<Nova> {
        self.inner.read().await.objects.get(&id.key()).cloned()
    }

    pub async fn last_operation(&self) -> Option<OperationResult> {
        self.inner.read().await.last_op
    }

    /// Number of apply invocations, successful or not.
    pub async fn applies(&self) -> usize {
        self.inner.read().await.applies
    }

    /// Number of mutating commits (created or updated).
    pub async fn commits(&self) -> usize {
        self.inner.read().await.commits
    }
}

#[async_trait]
impl NovaStore for MemoryStore {
    async fn get(
        &self,
        id: &ObjectIdentity,
    ) -> Result<Option<Nova>, StoreError> {
        let mut w = self.inner.write().await;
        if let Some(err) = w.fail_next_get.take() {
            return Err(err);
        }
        Ok(w.objects.get(&id.key()).cloned())
    }

    async fn apply(
        &self,
        id: &ObjectIdentity,
        desired: NovaSpec,
        owner: &OwnerIdentity,
    ) -> Result<OperationResult, StoreError> {
        let mut w = self.inner.write().await;
        w.applies += 1;
        if let Some(err) = w.fail_next_apply.take() {
            return Err(err);
        }

        let key = id.key();
        let existing = w.objects.get(&key).cloned();
        let op = match existing {
            None => {
                let mut nova = Nova::new(&id.name, desired);
                nova.meta_mut().namespace = Some(id.namespace.clone());
                owner.apply_to(nova.meta_mut())?;
                w.objects.insert(key, nova);
                w.commits += 1;
                OperationResult::Created
            }
            Some(current) => {
                let mut next = current.clone();
                owner.apply_to(next.meta_mut())?;
                next.spec = desired;
                if next == current {
                    OperationResult::Unchanged
                } else {
                    w.objects.insert(key, next);
                    w.commits += 1;
                    OperationResult::Updated
                }
            }
        };
        w.last_op = Some(op);
        Ok(op)
    }
}
