//! Invalidation and purge operations.
//!
//! Each operation deletes matching rows from every layer and removes the
//! ids from the layer index under the same writer lock, so a lookup
//! starting after the call returns can never observe a deleted row.
//! Store failures are retried with exponential backoff; exhaustion marks
//! the cache coherence-degraded until the operation later completes.

use super::SemanticCache;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::types::{CacheLayer, ScopeTag};
use tracing::info;
use uuid::Uuid;

impl SemanticCache {
    /// Delete every entry stamped with `version`, across all layers.
    ///
    /// Idempotent: repeating the call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the final storage error when retries are exhausted; the
    /// cache is then coherence-degraded and lookups add a source-version
    /// predicate at the store layer until a later call succeeds.
    pub async fn invalidate_by_source_version(&self, version: &str) -> Result<()> {
        let op = format!("source_version:{version}");
        let removed = self
            .run_invalidation(&op, |layer| self.invalidate_layer(layer, Predicate::SourceVersion(version)))
            .await?;
        info!(version, removed, "invalidated by source version");
        Ok(())
    }

    /// Delete every entry whose query text contains `needle` literally.
    ///
    /// Admin escape hatch; no pattern syntax is interpreted.
    ///
    /// # Errors
    ///
    /// As [`invalidate_by_source_version`](Self::invalidate_by_source_version).
    pub async fn invalidate_by_pattern(&self, needle: &str) -> Result<()> {
        let op = format!("pattern:{needle}");
        let removed = self
            .run_invalidation(&op, |layer| self.invalidate_layer(layer, Predicate::QuerySubstring(needle)))
            .await?;
        info!(needle, removed, "invalidated by query substring");
        Ok(())
    }

    /// Delete every entry tagged with `scope`. Used for data-subject
    /// deletion.
    ///
    /// # Errors
    ///
    /// As [`invalidate_by_source_version`](Self::invalidate_by_source_version).
    pub async fn purge_scope(&self, scope: &ScopeTag) -> Result<()> {
        let op = format!("scope:{scope}");
        let removed = self
            .run_invalidation(&op, |layer| self.invalidate_layer(layer, Predicate::Scope(scope)))
            .await?;
        info!(%scope, removed, "purged scope");
        Ok(())
    }

    async fn run_invalidation<F, Fut>(&self, op: &str, per_layer: F) -> Result<u64>
    where
        F: Fn(CacheLayer) -> Fut,
        Fut: std::future::Future<Output = Result<u64>>,
    {
        let policy = RetryPolicy::new(self.config.invalidation_retry);
        let mut removed = 0;

        for layer in CacheLayer::ALL {
            match policy.execute(|| per_layer(layer)).await {
                Ok(count) => removed += count,
                Err(e) => {
                    self.note_invalidation_failure(op.to_string());
                    return Err(e);
                }
            }
        }

        self.note_invalidation_success(op);
        Ok(removed)
    }

    /// One layer's share of an invalidation: delete the matching rows and
    /// drop their ids from the index, under the layer writer lock.
    async fn invalidate_layer(&self, layer: CacheLayer, predicate: Predicate<'_>) -> Result<u64> {
        let mut index = self.index(layer).write().await;
        let ids: Vec<Uuid> = match predicate {
            Predicate::SourceVersion(version) => {
                self.store.delete_by_source_version(layer, version).await?
            }
            Predicate::QuerySubstring(needle) => {
                self.store.delete_by_query_substring(layer, needle).await?
            }
            Predicate::Scope(scope) => self.store.delete_by_scope(layer, scope).await?,
        };
        index.remove_all(&ids);
        Ok(ids.len() as u64)
    }
}

#[derive(Clone, Copy)]
enum Predicate<'a> {
    SourceVersion(&'a str),
    QuerySubstring(&'a str),
    Scope(&'a ScopeTag),
}
