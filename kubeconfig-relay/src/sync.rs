//! Secret sync loop
//!
//! Consumes secret events one at a time and keeps a derived secret, whose
//! kubeconfig points at the cluster's load balancer host port, in step with
//! every `<cluster>-kubeconfig` source secret:
//!
//! - Added/Modified: resolve the `<cluster>-lb` host port, rewrite the
//!   kubeconfig and upsert `<cluster><suffix>`
//! - Deleted: delete `<cluster><suffix>`
//!
//! Failures are logged and the event is dropped. Nothing is retried; the
//! next event for the same secret simply tries again.

use crate::config::RelayConfig;
use crate::docker::{ContainerInventory, PortResolver};
use crate::error::{with_deadline, SyncError, SyncResult};
use crate::kubernetes::SecretStore;
use crate::shutdown::signalled;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kubeconfig_relay_common::kubeconfig::{
    mutate_kubeconfig, parse_kubeconfig, serialize_kubeconfig, ServerEndpoint, TlsPolicy,
};
use kubeconfig_relay_common::{SecretEvent, SecretEventKind, SecretNaming, KUBECONFIG_DATA_KEY};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Immutable settings of the sync loop
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub naming: SecretNaming,
    /// Host written into mutated kubeconfigs
    pub host: String,
    pub tls: TlsPolicy,
    /// Deadline applied to every secret store call
    pub call_timeout: Duration,
}

impl From<&RelayConfig> for SyncSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            naming: SecretNaming::new(config.suffix.clone()),
            host: config.host.clone(),
            tls: TlsPolicy::from_disable_flag(config.disable_tls_verify),
            call_timeout: config.call_timeout(),
        }
    }
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Not a kubeconfig secret
    Ignored,
    /// Derived secret created
    Created(String),
    /// Existing derived secret overwritten
    Updated(String),
    /// Derived secret removed
    Deleted(String),
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub received: u64,
    pub ignored: u64,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub failed: u64,
}

impl SyncStats {
    fn record(&mut self, result: &SyncResult<SyncOutcome>) {
        self.received += 1;
        match result {
            Ok(SyncOutcome::Ignored) => self.ignored += 1,
            Ok(SyncOutcome::Created(_)) => self.created += 1,
            Ok(SyncOutcome::Updated(_)) => self.updated += 1,
            Ok(SyncOutcome::Deleted(_)) => self.deleted += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// The sync loop and its two collaborators
pub struct SecretSync<S, C> {
    settings: SyncSettings,
    store: S,
    resolver: PortResolver<C>,
}

impl<S: SecretStore, C: ContainerInventory> SecretSync<S, C> {
    pub fn new(settings: SyncSettings, store: S, inventory: C) -> Self {
        let resolver = PortResolver::new(inventory, settings.call_timeout);
        Self {
            settings,
            store,
            resolver,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process events until the channel closes or shutdown is requested
    ///
    /// An event already being processed always runs to completion.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<SecretEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SyncStats {
        let mut stats = SyncStats::default();

        loop {
            let event = tokio::select! {
                biased;
                _ = signalled(&mut shutdown) => {
                    info!("Sync loop stopping on shutdown");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("Secret event channel closed, sync loop exiting");
                        break;
                    }
                },
            };

            let result = self.handle_event(&event).await;
            log_outcome(&event, &result);
            stats.record(&result);
        }

        stats
    }

    /// Handle a single event
    pub async fn handle_event(&self, event: &SecretEvent) -> SyncResult<SyncOutcome> {
        let Some(cluster) = self.settings.naming.cluster_name(&event.name) else {
            return Ok(SyncOutcome::Ignored);
        };
        let target = self.settings.naming.derived_secret_name(&cluster);

        match event.kind {
            SecretEventKind::Added | SecretEventKind::Modified => {
                info!(secret = %event.name, cluster = %cluster, "Detected {} kubeconfig secret", event.kind);
                let kubeconfig = self.render_kubeconfig(&cluster, event).await?;
                self.upsert(&target, kubeconfig).await
            }
            SecretEventKind::Deleted => {
                info!(secret = %event.name, cluster = %cluster, "Detected deleted kubeconfig secret");
                self.remove(&target).await
            }
        }
    }

    /// Mutated kubeconfig bytes for `cluster`
    async fn render_kubeconfig(&self, cluster: &str, event: &SecretEvent) -> SyncResult<Vec<u8>> {
        let container = self.settings.naming.load_balancer_name(cluster);
        let port = self.resolver.resolve_host_port(&container).await?;
        debug!(cluster = %cluster, "Container {} publishes the API server on port {}", container, port);

        let kubeconfig = parse_kubeconfig(event.kubeconfig_payload()?)?;
        let endpoint = ServerEndpoint::new(self.settings.host.clone(), port);
        let mutated = mutate_kubeconfig(kubeconfig, &endpoint, self.settings.tls)?;

        Ok(serialize_kubeconfig(&mutated)?)
    }

    /// Update `name` in place if it exists, create it otherwise
    async fn upsert(&self, name: &str, kubeconfig: Vec<u8>) -> SyncResult<SyncOutcome> {
        let timeout = self.settings.call_timeout;

        match with_deadline("get secret", timeout, self.store.get_secret(name)).await {
            Ok(mut existing) => {
                existing.data = Some(kubeconfig_data(kubeconfig));
                existing.string_data = None;
                with_deadline("update secret", timeout, self.store.replace_secret(&existing))
                    .await?;
                Ok(SyncOutcome::Updated(name.to_string()))
            }
            Err(SyncError::NotFound(_)) => {
                let secret = Secret {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(self.store.namespace().to_string()),
                        ..Default::default()
                    },
                    data: Some(kubeconfig_data(kubeconfig)),
                    ..Default::default()
                };
                with_deadline("create secret", timeout, self.store.create_secret(&secret)).await?;
                Ok(SyncOutcome::Created(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, name: &str) -> SyncResult<SyncOutcome> {
        with_deadline(
            "delete secret",
            self.settings.call_timeout,
            self.store.delete_secret(name),
        )
        .await?;
        Ok(SyncOutcome::Deleted(name.to_string()))
    }
}

fn kubeconfig_data(kubeconfig: Vec<u8>) -> BTreeMap<String, ByteString> {
    let mut data = BTreeMap::new();
    data.insert(KUBECONFIG_DATA_KEY.to_string(), ByteString(kubeconfig));
    data
}

fn log_outcome(event: &SecretEvent, result: &SyncResult<SyncOutcome>) {
    match result {
        Ok(SyncOutcome::Ignored) => {
            trace!(secret = %event.name, "Ignoring non-kubeconfig secret");
        }
        Ok(SyncOutcome::Created(name)) => {
            info!(secret = %event.name, "Mutated new kubeconfig secret {}", name);
        }
        Ok(SyncOutcome::Updated(name)) => {
            info!(secret = %event.name, "Mutated updated kubeconfig secret {}", name);
        }
        Ok(SyncOutcome::Deleted(name)) => {
            info!(secret = %event.name, "Deleted mutated kubeconfig secret {}", name);
        }
        Err(e) => match event.kind {
            SecretEventKind::Deleted => {
                warn!(secret = %event.name, "Failed to delete mutated kubeconfig secret: {}", e);
            }
            _ => {
                warn!(secret = %event.name, "Failed to mutate kubeconfig secret: {}", e);
            }
        },
    }
}
