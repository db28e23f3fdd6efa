use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::observability::WAL_COMPACTIONS_TOTAL;
use crate::store::WalStore;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites the WAL once enough appends pile up.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}

/// Compact when more than `threshold` appends happened since the last
/// compaction. Returns whether a compaction ran successfully.
pub async fn compact_if_due(store: &WalStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends <= threshold {
        debug!(appends, threshold, "compactor: nothing to do");
        return false;
    }
    match store.compact().await {
        Ok(properties) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "outcome" => "ok").increment(1);
            info!(appends, properties, "wal compacted");
            true
        }
        Err(e) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "outcome" => "error").increment(1);
            warn!("wal compaction failed: {e}");
            false
        }
    }
}
