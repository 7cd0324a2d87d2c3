//! Common test utilities and helpers
//!
//! In-memory stand-ins for the Kubernetes secret store and the Docker
//! container inventory.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::core::ErrorResponse;
use kubeconfig_relay::docker::{ContainerEntry, ContainerInventory, HostBinding, PortBindings};
use kubeconfig_relay::{SyncError, SyncResult, SyncSettings};
use kubeconfig_relay_common::kubeconfig::TlsPolicy;
use kubeconfig_relay_common::{SecretEvent, SecretNaming, API_SERVER_PORT, KUBECONFIG_DATA_KEY};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

pub const NAMESPACE: &str = "clusters";
pub const HOST: &str = "203.0.113.5";

pub const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: foo
  cluster:
    server: https://old:6443
    certificate-authority-data: LS0tLS1CRUdJTi0tLS0t
contexts:
- name: foo-admin@foo
  context:
    cluster: foo
    user: foo-admin
current-context: foo-admin@foo
users:
- name: foo-admin
  user:
    token: abc123
"#;

pub fn settings(suffix: &str) -> SyncSettings {
    SyncSettings {
        naming: SecretNaming::new(suffix),
        host: HOST.to_string(),
        tls: TlsPolicy::SkipVerify,
        call_timeout: Duration::from_secs(1),
    }
}

pub fn kubeconfig_data(kubeconfig: &str) -> BTreeMap<String, Vec<u8>> {
    let mut data = BTreeMap::new();
    data.insert(KUBECONFIG_DATA_KEY.to_string(), kubeconfig.as_bytes().to_vec());
    data
}

pub fn added(name: &str) -> SecretEvent {
    SecretEvent::added(name, kubeconfig_data(KUBECONFIG))
}

/// Secret store backed by a map, recording every call
#[derive(Default)]
pub struct FakeSecretStore {
    secrets: Mutex<BTreeMap<String, Secret>>,
    calls: Mutex<Vec<String>>,
    /// Message of the 500 API error returned by every `get_secret` call when set
    get_failure: Mutex<Option<String>>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, secret: Secret) {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets.lock().unwrap().insert(name, secret);
    }

    pub fn get(&self, name: &str) -> Option<Secret> {
        self.secrets.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.secrets.lock().unwrap().keys().cloned().collect()
    }

    /// Kubeconfig bytes stored in a secret
    pub fn value_of(&self, name: &str) -> Option<Vec<u8>> {
        self.get(name)
            .and_then(|s| s.data)
            .and_then(|d| d.get(KUBECONFIG_DATA_KEY).map(|v| v.0.clone()))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_gets(&self, message: &str) {
        *self.get_failure.lock().unwrap() = Some(message.to_string());
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl kubeconfig_relay::kubernetes::SecretStore for FakeSecretStore {
    fn namespace(&self) -> &str {
        NAMESPACE
    }

    async fn get_secret(&self, name: &str) -> SyncResult<Secret> {
        self.record(format!("get {}", name));
        if let Some(message) = self.get_failure.lock().unwrap().clone() {
            return Err(SyncError::Kube(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message,
                reason: "InternalError".to_string(),
                code: 500,
            })));
        }
        self.get(name)
            .ok_or_else(|| SyncError::NotFound(format!("secrets \"{}\" not found", name)))
    }

    async fn create_secret(&self, secret: &Secret) -> SyncResult<()> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.record(format!("create {}", name));
        self.insert(secret.clone());
        Ok(())
    }

    async fn replace_secret(&self, secret: &Secret) -> SyncResult<()> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.record(format!("replace {}", name));
        if self.get(&name).is_none() {
            return Err(SyncError::NotFound(format!("secrets \"{}\" not found", name)));
        }
        self.insert(secret.clone());
        Ok(())
    }

    async fn delete_secret(&self, name: &str) -> SyncResult<()> {
        self.record(format!("delete {}", name));
        self.secrets
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SyncError::NotFound(format!("secrets \"{}\" not found", name)))
    }
}

/// Container inventory with fixed contents
#[derive(Default)]
pub struct FakeInventory {
    containers: Vec<ContainerEntry>,
    bindings: HashMap<String, PortBindings>,
    delay: Option<Duration>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container publishing the API server port on `host_port`
    pub fn with_load_balancer(mut self, name: &str, host_port: &str) -> Self {
        let id = format!("id-{}", name);
        let mut bindings = PortBindings::new();
        bindings.insert(
            API_SERVER_PORT.to_string(),
            vec![HostBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: host_port.to_string(),
            }],
        );
        self.containers.push(ContainerEntry {
            id: id.clone(),
            names: vec![format!("/{}", name)],
        });
        self.bindings.insert(id, bindings);
        self
    }

    /// Add a container with arbitrary port bindings
    pub fn with_container(mut self, name: &str, bindings: PortBindings) -> Self {
        let id = format!("id-{}", name);
        self.containers.push(ContainerEntry {
            id: id.clone(),
            names: vec![format!("/{}", name)],
        });
        self.bindings.insert(id, bindings);
        self
    }

    /// Delay every call, to exercise deadlines
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ContainerInventory for FakeInventory {
    async fn list_containers(&self) -> SyncResult<Vec<ContainerEntry>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.containers.clone())
    }

    async fn inspect_port_bindings(&self, container_id: &str) -> SyncResult<PortBindings> {
        self.bindings
            .get(container_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("container {}", container_id)))
    }
}
