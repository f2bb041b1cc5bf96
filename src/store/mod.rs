use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    ObjectMeta, OwnerReference,
};

use crate::crd::nova::{Nova, NovaSpec};

pub mod kube;
pub mod memory;

pub use self::kube::KubeStore;
pub use self::memory::MemoryStore;

/// Coordinates of a dependent object within the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectIdentity {
    pub name: String,
    pub namespace: String,
}

impl ObjectIdentity {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl std::fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identity of the owning resource, stamped onto every dependent as a
/// controller owner reference.
#[derive(Clone, Debug)]
pub struct OwnerIdentity {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnerIdentity {
    pub fn owner_ref(&self) -> OwnerReference {
        OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            controller: Some(true),
            block_owner_deletion: None,
        }
    }

    /// Upsert the controller reference on `meta`. A controller reference
    /// held by a different owner is refused, not stolen.
    pub fn apply_to(&self, meta: &mut ObjectMeta) -> Result<(), StoreError> {
        let refs = meta.owner_references.get_or_insert_with(Vec::new);
        if let Some(existing) =
            refs.iter_mut().find(|r| r.controller == Some(true))
        {
            if existing.uid != self.uid {
                return Err(StoreError::OwnerConflict(format!(
                    "already controlled by {} {} ({})",
                    existing.kind, existing.name, existing.uid
                )));
            }
            *existing = self.owner_ref();
            return Ok(());
        }
        refs.push(self.owner_ref());
        Ok(())
    }
}

/// Outcome of an apply call, as observed by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationResult::Created => "created",
            OperationResult::Updated => "updated",
            OperationResult::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// Store failures are cloneable so tests can inject them verbatim; api
/// error payloads are carried as strings.
#[derive(thiserror::Error, Clone, Debug)]
pub enum StoreError {
    #[error("optimistic concurrency conflict: {0}")]
    Conflict(String),
    #[error("request rejected by the api server: {0}")]
    Rejected(String),
    #[error("object already owned by another controller: {0}")]
    OwnerConflict(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

/// Storage seam for the nova dependent. The Kubernetes-backed
/// implementation is the production path; tests substitute the in-memory
/// one.
#[async_trait]
pub trait NovaStore: Send + Sync + 'static {
    /// Fetch the object at `id`, or None when it does not exist.
    async fn get(
        &self,
        id: &ObjectIdentity,
    ) -> Result<Option<Nova>, StoreError>;

    /// Create the object at `id` if absent, otherwise overwrite its spec
    /// with `desired` and upsert `owner` as the controlling reference.
    /// Commits only when the stored object would actually change.
    async fn apply(
        &self,
        id: &ObjectIdentity,
        desired: NovaSpec,
        owner: &OwnerIdentity,
    ) -> Result<OperationResult, StoreError>;
}
