//! # Store Abstraction
//!
//! Unified trait for persistent cache stores (libSQL, in-memory, etc.)
//!
//! This allows the orchestrator to work with different storage
//! implementations transparently. Store handles are owned by the
//! orchestrator; no other component touches them directly.

pub mod memory;

use crate::error::Result;
use crate::types::{AccessInfo, CacheEntry, CacheLayer, DailyStats, ScopeTag};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub use memory::MemoryStore;

/// Unified persistent store trait
///
/// One row per entry per layer plus a daily-stats table and a metadata row
/// holding the embedding dimension. Every mutation is committed before the
/// call returns, so the orchestrator can update the vector index knowing the
/// row is durable.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Insert a row, replacing any existing row with the same id
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn insert_or_replace(&self, entry: &CacheEntry) -> Result<()>;

    /// Fetch rows by id, in no particular order
    ///
    /// Ids with no row are silently absent from the result. When
    /// `required_version` is set, rows stamped with any other source
    /// version are filtered out at the store layer (used while the cache
    /// is coherence-degraded).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn fetch_by_ids(
        &self,
        layer: CacheLayer,
        ids: &[Uuid],
        required_version: Option<&str>,
    ) -> Result<Vec<CacheEntry>>;

    /// Bump `last_accessed_at` to `now` and increment `access_count`
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn update_access(&self, layer: CacheLayer, id: Uuid, now: DateTime<Utc>) -> Result<()>;

    /// Delete rows by id, returning how many existed
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn delete_by_ids(&self, layer: CacheLayer, ids: &[Uuid]) -> Result<u64>;

    /// Delete rows whose TTL has elapsed at `now`, returning their ids
    ///
    /// Rows with `ttl_seconds = 0` never expire.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn delete_expired(&self, layer: CacheLayer, now: DateTime<Utc>) -> Result<Vec<Uuid>>;

    /// Delete rows stamped with `version`, returning their ids
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn delete_by_source_version(&self, layer: CacheLayer, version: &str) -> Result<Vec<Uuid>>;

    /// Delete rows tagged with `scope`, returning their ids
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn delete_by_scope(&self, layer: CacheLayer, scope: &ScopeTag) -> Result<Vec<Uuid>>;

    /// Delete rows whose `query_text` contains `needle` as a literal
    /// substring (no pattern syntax), returning their ids
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn delete_by_query_substring(&self, layer: CacheLayer, needle: &str) -> Result<Vec<Uuid>>;

    /// Number of rows in the layer
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn count(&self, layer: CacheLayer) -> Result<u64>;

    /// Row ids ordered by `last_accessed_at`
    ///
    /// # Arguments
    ///
    /// * `ascending` - `true` for least-recently-accessed first
    /// * `limit` - maximum ids returned
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn iter_ids_by_last_accessed(
        &self,
        layer: CacheLayer,
        ascending: bool,
        limit: usize,
    ) -> Result<Vec<Uuid>>;

    /// Access information of every row in the layer, for eviction ranking
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn load_access_info(&self, layer: CacheLayer) -> Result<Vec<AccessInfo>>;

    /// Id, embedding, and scope of every row in the layer, for index rebuilds
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn load_layer(&self, layer: CacheLayer) -> Result<Vec<(Uuid, Vec<f32>, ScopeTag)>>;

    /// Embedding dimension recorded at cache creation, if any
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn get_dimension(&self) -> Result<Option<usize>>;

    /// Record the embedding dimension (written once at cache creation)
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn set_dimension(&self, dimension: usize) -> Result<()>;

    /// Accumulate a drained stats bucket into the row for its date
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn record_daily_stats(&self, stats: &DailyStats) -> Result<()>;

    /// Load the stats row for a date, if present
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails
    async fn load_daily_stats(&self, date: NaiveDate) -> Result<Option<DailyStats>>;
}
