use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::store::MapStore;

/// Poll the map file for changes made outside this server, e.g. a document
/// restored from backup or edited by hand, and publish them.
pub async fn run_sync(store: Arc<MapStore>, interval: Duration) {
    loop {
        time::sleep(interval).await;
        if let Err(e) = store.reload_if_changed().await {
            log::warn!("Could not reload {}: {e:#}", store.path().display());
        }
    }
}
