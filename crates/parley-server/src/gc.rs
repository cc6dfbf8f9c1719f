use std::sync::Arc;

use tracing::{info, warn};

use parley_store::Store;
use parley_types::time_now;

use crate::config::GcSettings;

/// Background task that removes uploads no message refers to.
///
/// Runs on an interval, each pass deleting at most `batch` files older than
/// `max_age`. Errors are logged and the next pass retries.
pub async fn run_gc_loop(store: Arc<Store>, gc: GcSettings) {
    let mut interval = tokio::time::interval(gc.interval);

    loop {
        interval.tick().await;

        match collect_unused(store.clone(), gc).await {
            Ok(count) => {
                if count > 0 {
                    info!("GC: removed {} unused uploads", count);
                }
            }
            Err(e) => {
                warn!("GC error: {:#}", e);
            }
        }
    }
}

/// One pass. The store is synchronous, so it runs on a blocking thread.
pub async fn collect_unused(store: Arc<Store>, gc: GcSettings) -> anyhow::Result<usize> {
    let older_than = time_now() - gc.max_age;
    let count = tokio::task::spawn_blocking(move || store.files().delete_unused(older_than, gc.batch)).await??;
    Ok(count)
}
