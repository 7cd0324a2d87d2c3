//! kubeconfig-relay
//!
//! Watches a namespace for `<cluster>-kubeconfig` secrets and publishes a
//! `<cluster><suffix>` copy whose server points at the host port of the
//! cluster's `<cluster>-lb` Docker container.

pub mod config;
pub mod docker;
pub mod error;
pub mod kubernetes;
pub mod logging;
pub mod shutdown;
pub mod sync;

pub use error::{SyncError, SyncResult};
pub use sync::{SecretSync, SyncOutcome, SyncSettings, SyncStats};
