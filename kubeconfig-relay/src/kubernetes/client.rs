//! Kubernetes client construction

use crate::error::{SyncError, SyncResult};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::info;

/// Build a client from a kubeconfig file, or from in-cluster credentials
/// when no path is given
pub async fn connect(kubeconfig: Option<&Path>) -> SyncResult<Client> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                SyncError::Config(format!("Failed to read kubeconfig {:?}: {}", path, e))
            })?;

            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| SyncError::Config(format!("Failed to create config: {}", e)))?
        }
        None => Config::incluster().map_err(|e| {
            SyncError::Config(format!("Failed to get in-cluster config: {}", e))
        })?,
    };

    let api_server = config.cluster_url.to_string();

    let client = Client::try_from(config)
        .map_err(|e| SyncError::Config(format!("Failed to create client: {}", e)))?;

    info!("Using Kubernetes API server {}", api_server);

    Ok(client)
}
