//! Secret watching
//!
//! Opens a raw watch on the namespace's secrets and pumps the events into a
//! bounded channel consumed by the sync loop. There is no reconnect: when the
//! API server ends the watch, the pump returns and the channel closes.

use crate::error::SyncResult;
use crate::shutdown::signalled;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, WatchEvent, WatchParams};
use kubeconfig_relay_common::{SecretEvent, SecretEventKind};
use std::collections::BTreeMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Open a watch on all secrets of the api's namespace
///
/// Starting from resource version "0" replays existing secrets as Added
/// events before live changes arrive. The request carries kube's default
/// `timeoutSeconds` of 290, so the stream ends after about five minutes.
pub async fn open_secret_watch(
    secrets: &Api<Secret>,
) -> SyncResult<BoxStream<'static, kube::Result<WatchEvent<Secret>>>> {
    let stream = secrets.watch(&WatchParams::default(), "0").await?;
    Ok(stream.boxed())
}

/// Convert a raw watch event; bookmarks and error events yield `None`
pub fn to_secret_event(event: WatchEvent<Secret>) -> Option<SecretEvent> {
    let (kind, secret) = match event {
        WatchEvent::Added(secret) => (SecretEventKind::Added, secret),
        WatchEvent::Modified(secret) => (SecretEventKind::Modified, secret),
        WatchEvent::Deleted(secret) => (SecretEventKind::Deleted, secret),
        WatchEvent::Bookmark(_) => return None,
        WatchEvent::Error(e) => {
            warn!("Secret watch reported error: {} ({})", e.message, e.code);
            return None;
        }
    };

    let Some(name) = secret.metadata.name else {
        debug!("Ignoring {} secret without a name", kind);
        return None;
    };

    let data: BTreeMap<String, Vec<u8>> = secret
        .data
        .map(|d| d.into_iter().map(|(k, v)| (k, v.0)).collect())
        .unwrap_or_default();

    Some(SecretEvent { kind, name, data })
}

/// Forward watch events into `tx` until the stream ends, the receiver goes
/// away or shutdown is requested
///
/// Returns the number of events forwarded.
pub async fn pump_events<S>(
    stream: S,
    tx: mpsc::Sender<SecretEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> usize
where
    S: Stream<Item = kube::Result<WatchEvent<Secret>>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut forwarded = 0;

    loop {
        let item = tokio::select! {
            _ = signalled(&mut shutdown) => {
                debug!("Secret watch pump stopping on shutdown");
                break;
            }
            item = stream.next() => item,
        };

        let event = match item {
            Some(Ok(raw)) => match to_secret_event(raw) {
                Some(event) => event,
                None => continue,
            },
            Some(Err(e)) => {
                warn!("Failed to read secret watch event: {}", e);
                continue;
            }
            None => {
                warn!("Secret watch ended by the API server, no further events will be relayed");
                break;
            }
        };

        if tx.send(event).await.is_err() {
            debug!("Sync loop receiver dropped, stopping secret watch pump");
            break;
        }
        forwarded += 1;
    }

    forwarded
}
