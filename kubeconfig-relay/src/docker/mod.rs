//! Docker integration
//!
//! Resolves the host port a load balancer container publishes for the
//! cluster API server. The Docker Engine is reached through the
//! [`ContainerInventory`] seam so the resolver can run against fakes.

pub mod client;

use crate::error::{with_deadline, SyncError, SyncResult};
use async_trait::async_trait;
use kubeconfig_relay_common::API_SERVER_PORT;
use std::collections::HashMap;
use std::time::Duration;

pub use client::DockerInventory;

/// A container as listed by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    pub id: String,
    /// Name aliases, each prefixed with `/`
    pub names: Vec<String>,
}

/// Host side of a published port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBinding {
    pub host_ip: Option<String>,
    pub host_port: String,
}

/// Published ports keyed by `<containerPort>/<protocol>`
pub type PortBindings = HashMap<String, Vec<HostBinding>>;

/// Query interface of the container runtime
#[async_trait]
pub trait ContainerInventory: Send + Sync {
    /// List running containers
    async fn list_containers(&self) -> SyncResult<Vec<ContainerEntry>>;

    /// Published port bindings of a container
    async fn inspect_port_bindings(&self, container_id: &str) -> SyncResult<PortBindings>;
}

/// Looks up the host port bound to the API server port of a named container
///
/// Every call re-queries the runtime; nothing is cached.
pub struct PortResolver<C> {
    inventory: C,
    call_timeout: Duration,
}

impl<C: ContainerInventory> PortResolver<C> {
    pub fn new(inventory: C, call_timeout: Duration) -> Self {
        Self {
            inventory,
            call_timeout,
        }
    }

    pub fn inventory(&self) -> &C {
        &self.inventory
    }

    /// Host port bound to `6443/tcp` on the container named `container`
    pub async fn resolve_host_port(&self, container: &str) -> SyncResult<String> {
        let containers = with_deadline(
            "list containers",
            self.call_timeout,
            self.inventory.list_containers(),
        )
        .await?;

        let id = find_container_id(&containers, container)
            .ok_or_else(|| SyncError::NotFound(format!("container {}", container)))?;

        let bindings = with_deadline(
            "inspect container",
            self.call_timeout,
            self.inventory.inspect_port_bindings(id),
        )
        .await?;

        bindings
            .get(API_SERVER_PORT)
            .and_then(|bindings| bindings.first())
            .map(|binding| binding.host_port.clone())
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "port mapping not found for container {}, port {}",
                    container, API_SERVER_PORT
                ))
            })
    }
}

/// Id of the container carrying the alias `/<name>`
fn find_container_id<'a>(containers: &'a [ContainerEntry], name: &str) -> Option<&'a str> {
    let alias = format!("/{}", name);
    containers
        .iter()
        .find(|c| c.names.iter().any(|n| *n == alias))
        .map(|c| c.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, names: &[&str]) -> ContainerEntry {
        ContainerEntry {
            id: id.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn test_find_container_requires_exact_alias() {
        let containers = vec![
            entry("aaa", &["/foo-lb-old"]),
            entry("bbb", &["/bar", "/foo-lb"]),
        ];
        assert_eq!(find_container_id(&containers, "foo-lb"), Some("bbb"));
        assert_eq!(find_container_id(&containers, "foo"), None);
        assert_eq!(find_container_id(&containers, "/foo-lb"), None);
    }
}
