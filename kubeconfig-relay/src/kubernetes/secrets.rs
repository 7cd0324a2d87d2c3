//! Namespaced secret operations

use crate::error::SyncResult;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

/// Secret operations the sync loop needs, scoped to one namespace
///
/// A missing secret is reported as [`crate::error::SyncError::NotFound`].
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Namespace all operations are scoped to
    fn namespace(&self) -> &str;

    async fn get_secret(&self, name: &str) -> SyncResult<Secret>;

    async fn create_secret(&self, secret: &Secret) -> SyncResult<()>;

    /// Replace an existing secret; `secret` must carry the fetched metadata
    async fn replace_secret(&self, secret: &Secret) -> SyncResult<()>;

    async fn delete_secret(&self, name: &str) -> SyncResult<()>;
}

/// [`SecretStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretStore {
    api: Api<Secret>,
    namespace: String,
}

impl KubeSecretStore {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }

    pub fn api(&self) -> &Api<Secret> {
        &self.api
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_secret(&self, name: &str) -> SyncResult<Secret> {
        Ok(self.api.get(name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> SyncResult<()> {
        self.api.create(&PostParams::default(), secret).await?;
        Ok(())
    }

    async fn replace_secret(&self, secret: &Secret) -> SyncResult<()> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.api.replace(&name, &PostParams::default(), secret).await?;
        Ok(())
    }

    async fn delete_secret(&self, name: &str) -> SyncResult<()> {
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore")
            .field("namespace", &self.namespace)
            .finish()
    }
}
