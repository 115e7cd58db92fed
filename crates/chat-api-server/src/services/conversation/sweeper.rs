use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::store::ConversationStore;

/// Periodically evict idle conversations from `store`.
/// Runs until the returned handle is aborted or the runtime shuts down.
pub fn spawn_retention_sweeper(store: Arc<dyn ConversationStore>, every: Duration) -> JoinHandle<()> {
    info!("Retention sweeper started (interval: {:?})", every);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = store.cleanup_expired().await;
            let remaining = store.len().await;
            debug!(removed, remaining, "Retention sweep finished");
        }
    })
}
