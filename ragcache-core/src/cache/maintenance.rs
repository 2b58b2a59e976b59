//! Background maintenance: TTL sweep, stats flush, index rebuilds.

use super::SemanticCache;
use crate::constants::MIN_INDEX_RECALL;
use crate::error::Result;
use crate::types::CacheLayer;
use chrono::Utc;
use tracing::{debug, info, warn};

impl SemanticCache {
    /// Remove expired rows from every layer and drop their index entries.
    ///
    /// Invoked periodically by the TTL sweeper; callable directly. Acquires
    /// each layer writer lock in a short burst.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; earlier layers stay swept.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut removed = 0;

        for layer in CacheLayer::ALL {
            let mut index = self.index(layer).write().await;
            let ids = self.store.delete_expired(layer, now).await?;
            index.remove_all(&ids);
            removed += ids.len() as u64;
        }

        if removed > 0 {
            info!(removed, "ttl sweep removed expired entries");
        } else {
            debug!("ttl sweep found nothing expired");
        }
        Ok(removed)
    }

    /// Drain the in-memory counters into the persistent daily-stats table.
    ///
    /// # Errors
    ///
    /// Returns the storage error; the drained bucket is lost when the write
    /// fails (counters are already reset), which only under-reports stats.
    pub async fn flush_daily_stats(&self) -> Result<()> {
        if let Some(bucket) = self.stats.drain_daily() {
            self.store.record_daily_stats(&bucket).await?;
            debug!(date = %bucket.date, queries = bucket.total_queries, "flushed daily stats");
        }
        Ok(())
    }

    /// Rebuild one layer's vector index from the persistent store.
    ///
    /// Run at startup and after an index/store divergence is detected; the
    /// layer misses while the writer lock is held.
    ///
    /// # Errors
    ///
    /// Returns the storage error when the layer cannot be read.
    pub async fn rebuild_index(&self, layer: CacheLayer) -> Result<()> {
        let mut index = self.index(layer).write().await;
        let live = self.store.load_layer(layer).await?;
        let count = live.len();
        index.rebuild_from(live);
        debug!(%layer, entries = count, "rebuilt index from store");
        Ok(())
    }

    /// Measure approximate-search recall against brute force per layer,
    /// logging a warning below the accuracy contract.
    pub(crate) async fn run_recall_self_test(&self) {
        for layer in CacheLayer::ALL {
            let index = self.index(layer).read().await;
            if !index.is_partitioned() {
                continue;
            }
            let recall = index.self_test_recall(self.config.top_k, 32);
            if recall < MIN_INDEX_RECALL {
                warn!(%layer, recall, "index recall below contract");
            } else {
                debug!(%layer, recall, "index recall self-test passed");
            }
        }
    }
}
