//! Kubernetes integration
//!
//! Provides the pieces the relay needs from the cluster API:
//! - Client construction from a kubeconfig file or in-cluster credentials
//! - Namespaced secret reads and writes behind the [`SecretStore`] seam
//! - The secret watch feeding the sync loop

pub mod client;
pub mod secrets;
pub mod watch;

pub use client::connect;
pub use secrets::{KubeSecretStore, SecretStore};
