#![allow(dead_code)]

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    Client,
    api::{Api, DeleteParams, Patch, PatchParams, PostParams},
};
use serde_json::json;
use tokio::task::JoinHandle;

use ostk_ctlplane::crd::conditions::ConditionType;
use ostk_ctlplane::crd::control_plane::ControlPlane;
use ostk_ctlplane::crd::nova::Nova;

// DNS-1123 safe numeric suffix for unique names
pub const DIGITS: [char; 10] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
pub fn uniq(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(6, &DIGITS))
}

// Env guard utilities
pub struct EnvGuard {
    key: &'static str,
    old: Option<String>,
}
impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(ref v) = self.old {
                std::env::set_var(self.key, v);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }
}
pub fn set_env(key: &'static str, val: &str) -> EnvGuard {
    let old = std::env::var(key).ok();
    unsafe {
        std::env::set_var(key, val);
    }
    EnvGuard { key, old }
}

pub async fn create_namespace(client: Client, ns: &str) {
    let api: Api<Namespace> = Api::all(client);
    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(ns.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let _ = api.create(&PostParams::default(), &namespace).await;
}

pub async fn wait_for_nova(ns: &str, client: Client) -> Option<Nova> {
    let api: Api<Nova> = Api::namespaced(client, ns);
    for _ in 0..30 {
        if let Some(nova) = api.get_opt("nova").await.unwrap_or(None) {
            return Some(nova);
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
    None
}

// Stands in for the external nova reconciler.
pub async fn mark_nova_ready(ns: &str, client: Client) {
    let api: Api<Nova> = Api::namespaced(client, ns);
    let patch = json!({"status": {"ready": true}});
    let _ = api
        .patch_status("nova", &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .expect("patch nova status");
}

pub async fn wait_for_condition(
    ns: &str,
    name: &str,
    client: Client,
    type_: ConditionType,
) -> bool {
    let api: Api<ControlPlane> = Api::namespaced(client, ns);
    for _ in 0..30 {
        let cp = api.get_opt(name).await.unwrap_or(None);
        if let Some(cp) = cp {
            if cp.conditions().map(|c| c.is_true(type_)).unwrap_or(false) {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
    false
}

pub async fn cleanup_k8s(ns: &str, name: &str, client: Client) {
    let cp_api: Api<ControlPlane> = Api::namespaced(client.clone(), ns);
    let nova_api: Api<Nova> = Api::namespaced(client.clone(), ns);
    let _ = nova_api.delete("nova", &DeleteParams::default()).await;
    let _ = cp_api.delete(name, &DeleteParams::default()).await;
    let ns_api: Api<Namespace> = Api::all(client);
    let _ = ns_api.delete(ns, &DeleteParams::default()).await;
}

// RAII guard to ensure controller abort + cleanup
pub struct ControllerGuard {
    ns: String,
    name: String,
    client: Client,
    ctrl: Option<JoinHandle<()>>,
}

impl ControllerGuard {
    pub fn new(ns: &str, name: &str, client: Client) -> Self {
        Self {
            ns: ns.to_string(),
            name: name.to_string(),
            client,
            ctrl: None,
        }
    }
    pub fn with_controller(mut self, ctrl: JoinHandle<()>) -> Self {
        self.ctrl = Some(ctrl);
        self
    }
}

impl Drop for ControllerGuard {
    fn drop(&mut self) {
        if let Some(ref handle) = self.ctrl {
            handle.abort();
        }
        let ns = self.ns.clone();
        let name = self.name.clone();
        let client = self.client.clone();
        let _ = tokio::spawn(async move {
            cleanup_k8s(&ns, &name, client).await;
        });
    }
}
