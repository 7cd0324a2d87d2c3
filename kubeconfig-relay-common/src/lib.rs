//! Common types shared between the kubeconfig-relay daemon and its tests
//!
//! Holds everything that needs no I/O: the secret naming scheme, the secret
//! event model and the kubeconfig mutator.

pub mod kubeconfig;

use std::collections::BTreeMap;
use std::fmt;

/// Substring identifying a source kubeconfig secret
pub const SOURCE_MARKER: &str = "-kubeconfig";

/// Suffix of the load balancer container fronting a cluster's API server
pub const LOAD_BALANCER_SUFFIX: &str = "-lb";

/// Data key holding the serialized kubeconfig in both source and derived secrets
pub const KUBECONFIG_DATA_KEY: &str = "value";

/// Container port of the API server, as keyed in the runtime's port map
pub const API_SERVER_PORT: &str = "6443/tcp";

/// Secret naming scheme
///
/// Maps `<cluster>-kubeconfig` source secrets to `<cluster><suffix>` derived
/// secrets and `<cluster>-lb` load balancer containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretNaming {
    suffix: String,
}

impl SecretNaming {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether a secret name refers to a source kubeconfig secret
    pub fn is_source(&self, secret_name: &str) -> bool {
        secret_name.contains(SOURCE_MARKER)
    }

    /// Cluster name derived from a source secret name, `None` for any other secret
    pub fn cluster_name(&self, secret_name: &str) -> Option<String> {
        if !self.is_source(secret_name) {
            return None;
        }
        Some(secret_name.replace(SOURCE_MARKER, ""))
    }

    pub fn derived_secret_name(&self, cluster: &str) -> String {
        format!("{}{}", cluster, self.suffix)
    }

    pub fn load_balancer_name(&self, cluster: &str) -> String {
        format!("{}{}", cluster, LOAD_BALANCER_SUFFIX)
    }
}

/// Kind of secret change delivered by the watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEventKind {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for SecretEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// A single secret change, detached from the Kubernetes object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEvent {
    pub kind: SecretEventKind,
    pub name: String,
    /// Secret data; empty for deletions
    pub data: BTreeMap<String, Vec<u8>>,
}

impl SecretEvent {
    pub fn added(name: impl Into<String>, data: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            kind: SecretEventKind::Added,
            name: name.into(),
            data,
        }
    }

    pub fn modified(name: impl Into<String>, data: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            kind: SecretEventKind::Modified,
            name: name.into(),
            data,
        }
    }

    pub fn deleted(name: impl Into<String>) -> Self {
        Self {
            kind: SecretEventKind::Deleted,
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    /// Serialized kubeconfig carried by the event
    pub fn kubeconfig_payload(&self) -> Result<&[u8]> {
        self.data
            .get(KUBECONFIG_DATA_KEY)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::MissingData {
                secret: self.name.clone(),
                key: KUBECONFIG_DATA_KEY.to_string(),
            })
    }
}

/// Common error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed kubeconfig: {0}")]
    MalformedKubeconfig(String),

    #[error("Failed to parse kubeconfig: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to serialize kubeconfig: {0}")]
    Serialize(String),

    #[error("Secret {secret} has no '{key}' data")]
    MissingData { secret: String, key: String },
}

pub type Result<T> = std::result::Result<T, Error>;
