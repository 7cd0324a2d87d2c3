//! Error types for the relay daemon
//!
//! Maps kube-rs and bollard errors onto the few classes the sync loop cares
//! about: not-found, timeout, everything else.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while syncing a single secret event
#[derive(Debug, Error)]
pub enum SyncError {
    /// Container, port binding or secret does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// External call exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: String,
        after: Duration,
    },

    /// Error from kube-rs client
    #[error("Kubernetes API error: {0}")]
    Kube(kube::Error),

    /// Error from the Docker Engine API
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Kubeconfig could not be parsed, mutated or serialized
    #[error(transparent)]
    Kubeconfig(#[from] kubeconfig_relay_common::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout { .. })
    }
}

impl From<kube::Error> for SyncError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => {
                SyncError::NotFound(response.message)
            }
            other => SyncError::Kube(other),
        }
    }
}

/// Result type alias for sync operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Run an external call under a deadline
///
/// Elapsed deadlines become [`SyncError::Timeout`]; errors from the call are
/// converted through `From`.
pub async fn with_deadline<T, E, F>(operation: &str, after: Duration, call: F) -> SyncResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<SyncError>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(SyncError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("secrets \"foo\" code {}", code),
            reason: "NotFound".to_string(),
            code,
        })
    }

    #[test]
    fn test_kube_404_is_not_found() {
        let err: SyncError = api_error(404).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_kube_errors_are_kept() {
        let err: SyncError = api_error(403).into();
        assert!(matches!(err, SyncError::Kube(_)));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_deadline_elapsed() {
        let result: SyncResult<()> = with_deadline("slow call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, SyncError>(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("slow call"));
    }

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let result = with_deadline("fast call", Duration::from_secs(1), async {
            Ok::<_, SyncError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }
}
