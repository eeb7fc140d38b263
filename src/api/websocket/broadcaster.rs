//! Watcher → registry fan-out
//!
//! Each stabilized change becomes exactly one [`UpdateEvent`], sent to all
//! open channels. Delivery is fire-and-forget.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use super::registry::ClientRegistry;
use crate::types::UpdateEvent;
use crate::watcher::StabilizedChange;

/// Announce one change to every open client, returning the recipient count
pub fn notify_clients(registry: &ClientRegistry, change: &StabilizedChange) -> usize {
    let event = UpdateEvent::now();
    let delivered = registry.broadcast(&event.to_message());
    tracing::info!(
        path = %change.path.display(),
        timestamp = event.timestamp,
        recipients = delivered,
        "file changed, clients notified"
    );
    delivered
}

/// Drive `changes` until it ends, broadcasting each one
pub async fn run_notifier<S>(changes: S, registry: Arc<ClientRegistry>)
where
    S: Stream<Item = StabilizedChange>,
{
    futures::pin_mut!(changes);
    while let Some(change) = changes.next().await {
        notify_clients(&registry, &change);
    }
    tracing::debug!("change stream ended, notifier stopping");
}

/// Spawn [`run_notifier`] on the runtime
pub fn spawn_notifier<S>(changes: S, registry: Arc<ClientRegistry>) -> JoinHandle<()>
where
    S: Stream<Item = StabilizedChange> + Send + 'static,
{
    tokio::spawn(run_notifier(changes, registry))
}
