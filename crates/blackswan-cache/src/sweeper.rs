use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::store::ResultStore;

/// Periodically remove expired entries until `cancel` fires.
pub async fn sweep_loop(store: Arc<dyn ResultStore>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cache sweeper shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                match store.cleanup_expired().await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "Swept expired cache entries");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Cache sweep failed");
                    }
                }
            }
        }
    }
}
