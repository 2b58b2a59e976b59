//! In-memory store implementation.
//!
//! Reference implementation of [`CacheStore`] used in tests and for
//! deployments that can afford to lose the cache on restart. Semantics match
//! the durable libSQL backend exactly.

use super::CacheStore;
use crate::error::Result;
use crate::types::{AccessInfo, CacheEntry, CacheLayer, DailyStats, ScopeTag};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    answers: HashMap<Uuid, CacheEntry>,
    compressed: HashMap<Uuid, CacheEntry>,
    chunks: HashMap<Uuid, CacheEntry>,
    daily: HashMap<NaiveDate, DailyStats>,
    dimension: Option<usize>,
}

impl Inner {
    fn layer(&self, layer: CacheLayer) -> &HashMap<Uuid, CacheEntry> {
        match layer {
            CacheLayer::Answer => &self.answers,
            CacheLayer::Compressed => &self.compressed,
            CacheLayer::Chunks => &self.chunks,
        }
    }

    fn layer_mut(&mut self, layer: CacheLayer) -> &mut HashMap<Uuid, CacheEntry> {
        match layer {
            CacheLayer::Answer => &mut self.answers,
            CacheLayer::Compressed => &mut self.compressed,
            CacheLayer::Chunks => &mut self.chunks,
        }
    }

    fn drain_matching<F>(&mut self, layer: CacheLayer, predicate: F) -> Vec<Uuid>
    where
        F: Fn(&CacheEntry) -> bool,
    {
        let map = self.layer_mut(layer);
        let ids: Vec<Uuid> = map
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            map.remove(id);
        }
        ids
    }
}

/// In-memory [`CacheStore`] backed by per-layer hash maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn insert_or_replace(&self, entry: &CacheEntry) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .layer_mut(entry.layer())
            .insert(entry.header().id, entry.clone());
        Ok(())
    }

    async fn fetch_by_ids(
        &self,
        layer: CacheLayer,
        ids: &[Uuid],
        required_version: Option<&str>,
    ) -> Result<Vec<CacheEntry>> {
        let inner = self.inner.read().await;
        let map = inner.layer(layer);
        Ok(ids
            .iter()
            .filter_map(|id| map.get(id))
            .filter(|entry| {
                required_version.is_none_or(|v| entry.header().source_version == v)
            })
            .cloned()
            .collect())
    }

    async fn update_access(&self, layer: CacheLayer, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.layer_mut(layer).get_mut(&id) {
            let header = entry.header_mut();
            header.last_accessed_at = now;
            header.access_count += 1;
        }
        Ok(())
    }

    async fn delete_by_ids(&self, layer: CacheLayer, ids: &[Uuid]) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let map = inner.layer_mut(layer);
        let mut deleted = 0;
        for id in ids {
            if map.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_expired(&self, layer: CacheLayer, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut inner = self.inner.write().await;
        Ok(inner.drain_matching(layer, |entry| entry.header().is_expired(now)))
    }

    async fn delete_by_source_version(&self, layer: CacheLayer, version: &str) -> Result<Vec<Uuid>> {
        let mut inner = self.inner.write().await;
        Ok(inner.drain_matching(layer, |entry| entry.header().source_version == version))
    }

    async fn delete_by_scope(&self, layer: CacheLayer, scope: &ScopeTag) -> Result<Vec<Uuid>> {
        let mut inner = self.inner.write().await;
        Ok(inner.drain_matching(layer, |entry| entry.header().scope == *scope))
    }

    async fn delete_by_query_substring(&self, layer: CacheLayer, needle: &str) -> Result<Vec<Uuid>> {
        let mut inner = self.inner.write().await;
        Ok(inner.drain_matching(layer, |entry| entry.header().query_text.contains(needle)))
    }

    async fn count(&self, layer: CacheLayer) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.layer(layer).len() as u64)
    }

    async fn iter_ids_by_last_accessed(
        &self,
        layer: CacheLayer,
        ascending: bool,
        limit: usize,
    ) -> Result<Vec<Uuid>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<(Uuid, DateTime<Utc>)> = inner
            .layer(layer)
            .values()
            .map(|entry| (entry.header().id, entry.header().last_accessed_at))
            .collect();
        rows.sort_by(|a, b| {
            let ordering = a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0));
            if ascending { ordering } else { ordering.reverse() }
        });
        Ok(rows.into_iter().take(limit).map(|(id, _)| id).collect())
    }

    async fn load_access_info(&self, layer: CacheLayer) -> Result<Vec<AccessInfo>> {
        let inner = self.inner.read().await;
        Ok(inner
            .layer(layer)
            .values()
            .map(|entry| {
                let header = entry.header();
                AccessInfo {
                    id: header.id,
                    last_accessed_at: header.last_accessed_at,
                    access_count: header.access_count,
                    created_at: header.created_at,
                }
            })
            .collect())
    }

    async fn load_layer(&self, layer: CacheLayer) -> Result<Vec<(Uuid, Vec<f32>, ScopeTag)>> {
        let inner = self.inner.read().await;
        Ok(inner
            .layer(layer)
            .values()
            .map(|entry| {
                let header = entry.header();
                (header.id, header.embedding.clone(), header.scope.clone())
            })
            .collect())
    }

    async fn get_dimension(&self) -> Result<Option<usize>> {
        Ok(self.inner.read().await.dimension)
    }

    async fn set_dimension(&self, dimension: usize) -> Result<()> {
        self.inner.write().await.dimension = Some(dimension);
        Ok(())
    }

    async fn record_daily_stats(&self, stats: &DailyStats) -> Result<()> {
        let mut inner = self.inner.write().await;
        let bucket = inner
            .daily
            .entry(stats.date)
            .or_insert_with(|| DailyStats::empty(stats.date));
        bucket.total_queries += stats.total_queries;
        bucket.l1_hits += stats.l1_hits;
        bucket.l2_hits += stats.l2_hits;
        bucket.l3_hits += stats.l3_hits;
        bucket.misses += stats.misses;
        bucket.tokens_saved += stats.tokens_saved;
        bucket.estimated_cost_saved += stats.estimated_cost_saved;
        Ok(())
    }

    async fn load_daily_stats(&self, date: NaiveDate) -> Result<Option<DailyStats>> {
        Ok(self.inner.read().await.daily.get(&date).cloned())
    }
}
