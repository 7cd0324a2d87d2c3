//! Docker Engine client backed by bollard

use super::{ContainerEntry, ContainerInventory, HostBinding, PortBindings};
use crate::error::SyncResult;
use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use std::time::Duration;
use tracing::{debug, warn};

/// Container inventory of a remote Docker daemon
#[derive(Clone)]
pub struct DockerInventory {
    docker: Docker,
}

impl DockerInventory {
    /// Client for a daemon at `tcp://host:port`
    ///
    /// Only a malformed endpoint fails. An unreachable daemon is not fatal:
    /// the default API version is kept and each lookup fails on its own.
    pub async fn connect(endpoint: &str, timeout: Duration) -> SyncResult<Self> {
        let docker = Docker::connect_with_http(endpoint, timeout.as_secs(), API_DEFAULT_VERSION)?;

        let docker = match docker.clone().negotiate_version().await {
            Ok(negotiated) => {
                debug!("Connected to Docker daemon at {}", endpoint);
                negotiated
            }
            Err(e) => {
                warn!(
                    "Docker API version negotiation with {} failed, using {}: {}",
                    endpoint, API_DEFAULT_VERSION, e
                );
                docker
            }
        };

        Ok(Self { docker })
    }

    pub fn inner(&self) -> &Docker {
        &self.docker
    }
}

#[async_trait]
impl ContainerInventory for DockerInventory {
    async fn list_containers(&self) -> SyncResult<Vec<ContainerEntry>> {
        let options = Some(ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        });

        let containers = self.docker.list_containers(options).await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                Some(ContainerEntry {
                    id: c.id?,
                    names: c.names.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn inspect_port_bindings(&self, container_id: &str) -> SyncResult<PortBindings> {
        let details = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await?;

        let ports = details
            .network_settings
            .and_then(|settings| settings.ports)
            .unwrap_or_default();

        Ok(ports
            .into_iter()
            .filter_map(|(port, bindings)| {
                let bindings: Vec<HostBinding> = bindings?
                    .into_iter()
                    .filter_map(|b| {
                        Some(HostBinding {
                            host_port: b.host_port.filter(|p| !p.is_empty())?,
                            host_ip: b.host_ip,
                        })
                    })
                    .collect();
                Some((port, bindings))
            })
            .collect())
    }
}

impl std::fmt::Debug for DockerInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerInventory").finish_non_exhaustive()
    }
}
