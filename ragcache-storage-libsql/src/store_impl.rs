//! [`CacheStore`] implementation over libSQL.

use crate::rows::{embedding_to_blob, escape_like, row_to_entry, select_columns};
use crate::schema::METADATA_DIMENSION;
use crate::LibsqlStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{params, params_from_iter, Value};
use ragcache_core::error::{Error, Result};
use ragcache_core::store::CacheStore;
use ragcache_core::types::{AccessInfo, CacheEntry, CacheLayer, DailyStats, ScopeTag};
use tracing::debug;
use uuid::Uuid;

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn id_values(ids: &[Uuid]) -> Vec<Value> {
    ids.iter().map(|id| Value::from(id.to_string())).collect()
}

fn storage_err(context: &str) -> impl Fn(libsql::Error) -> Error + '_ {
    move |e| Error::Storage(format!("{context}: {e}"))
}

impl LibsqlStore {
    /// Collect ids matching `where_clause`, then delete them.
    ///
    /// Two statements on one connection; the orchestrator holds the layer
    /// writer lock across the call, so nothing slips between them.
    async fn delete_returning_ids(
        &self,
        layer: CacheLayer,
        where_clause: &str,
        values: Vec<Value>,
    ) -> Result<Vec<Uuid>> {
        let conn = self.connect()?;
        let table = layer.table_name();

        let select_sql = format!("SELECT id FROM {table} WHERE {where_clause}");
        let mut rows = conn
            .query(&select_sql, params_from_iter(values.clone()))
            .await
            .map_err(storage_err("Failed to select rows for deletion"))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(storage_err("Failed to fetch deletion candidate"))?
        {
            let raw: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
            ids.push(
                Uuid::parse_str(&raw)
                    .map_err(|e| Error::Storage(format!("invalid entry id: {e}")))?,
            );
        }

        if !ids.is_empty() {
            let delete_sql = format!("DELETE FROM {table} WHERE {where_clause}");
            conn.execute(&delete_sql, params_from_iter(values))
                .await
                .map_err(storage_err("Failed to delete rows"))?;
        }
        Ok(ids)
    }
}

#[async_trait]
impl CacheStore for LibsqlStore {
    async fn insert_or_replace(&self, entry: &CacheEntry) -> Result<()> {
        let conn = self.connect()?;
        let header = entry.header();
        debug!(layer = %entry.layer(), id = %header.id, "storing cache entry");

        match entry {
            CacheEntry::Answer(record) => {
                let sql = r#"
                    INSERT OR REPLACE INTO answer_records (
                        id, query_text, scope_tag, embedding, answer_text,
                        producing_agent, token_count, created_at, last_accessed_at,
                        access_count, ttl_seconds, source_version
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#;
                conn.execute(
                    sql,
                    params![
                        header.id.to_string(),
                        header.query_text.clone(),
                        header.scope.encode(),
                        embedding_to_blob(&header.embedding),
                        record.answer_text.clone(),
                        header.producing_agent.clone(),
                        header.token_count as i64,
                        header.created_at.timestamp_millis(),
                        header.last_accessed_at.timestamp_millis(),
                        header.access_count as i64,
                        header.ttl_seconds,
                        header.source_version.clone(),
                    ],
                )
                .await
                .map_err(storage_err("Failed to store answer record"))?;
            }
            CacheEntry::Compressed(record) => {
                let chunk_ids_json = serde_json::to_string(&record.referenced_chunk_ids)
                    .map_err(Error::Serialization)?;
                let sql = r#"
                    INSERT OR REPLACE INTO compressed_records (
                        id, query_text, scope_tag, embedding, compressed_context,
                        referenced_chunk_ids, producing_agent, token_count, created_at,
                        last_accessed_at, access_count, ttl_seconds, source_version
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#;
                conn.execute(
                    sql,
                    params![
                        header.id.to_string(),
                        header.query_text.clone(),
                        header.scope.encode(),
                        embedding_to_blob(&header.embedding),
                        record.compressed_context.clone(),
                        chunk_ids_json,
                        header.producing_agent.clone(),
                        header.token_count as i64,
                        header.created_at.timestamp_millis(),
                        header.last_accessed_at.timestamp_millis(),
                        header.access_count as i64,
                        header.ttl_seconds,
                        header.source_version.clone(),
                    ],
                )
                .await
                .map_err(storage_err("Failed to store compressed record"))?;
            }
            CacheEntry::Chunks(record) => {
                let chunk_ids_json =
                    serde_json::to_string(&record.chunk_ids).map_err(Error::Serialization)?;
                let chunk_scores_json =
                    serde_json::to_string(&record.chunk_scores).map_err(Error::Serialization)?;
                let sql = r#"
                    INSERT OR REPLACE INTO chunk_records (
                        id, query_text, scope_tag, embedding, chunk_ids,
                        chunk_scores, producing_agent, token_count, created_at,
                        last_accessed_at, access_count, ttl_seconds, source_version
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#;
                conn.execute(
                    sql,
                    params![
                        header.id.to_string(),
                        header.query_text.clone(),
                        header.scope.encode(),
                        embedding_to_blob(&header.embedding),
                        chunk_ids_json,
                        chunk_scores_json,
                        header.producing_agent.clone(),
                        header.token_count as i64,
                        header.created_at.timestamp_millis(),
                        header.last_accessed_at.timestamp_millis(),
                        header.access_count as i64,
                        header.ttl_seconds,
                        header.source_version.clone(),
                    ],
                )
                .await
                .map_err(storage_err("Failed to store chunk record"))?;
            }
        }
        Ok(())
    }

    async fn fetch_by_ids(
        &self,
        layer: CacheLayer,
        ids: &[Uuid],
        required_version: Option<&str>,
    ) -> Result<Vec<CacheEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connect()?;

        let mut sql = format!(
            "SELECT {} FROM {} WHERE id IN ({})",
            select_columns(layer),
            layer.table_name(),
            placeholders(ids.len()),
        );
        let mut values = id_values(ids);
        if let Some(version) = required_version {
            sql.push_str(" AND source_version = ?");
            values.push(Value::from(version.to_string()));
        }

        let mut rows = conn
            .query(&sql, params_from_iter(values))
            .await
            .map_err(storage_err("Failed to fetch rows"))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(storage_err("Failed to fetch row"))?
        {
            entries.push(row_to_entry(layer, &row)?);
        }
        Ok(entries)
    }

    async fn update_access(&self, layer: CacheLayer, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        let sql = format!(
            "UPDATE {} SET last_accessed_at = ?, access_count = access_count + 1 WHERE id = ?",
            layer.table_name()
        );
        conn.execute(&sql, params![now.timestamp_millis(), id.to_string()])
            .await
            .map_err(storage_err("Failed to update access"))?;
        Ok(())
    }

    async fn delete_by_ids(&self, layer: CacheLayer, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.connect()?;
        let sql = format!(
            "DELETE FROM {} WHERE id IN ({})",
            layer.table_name(),
            placeholders(ids.len()),
        );
        let deleted = conn
            .execute(&sql, params_from_iter(id_values(ids)))
            .await
            .map_err(storage_err("Failed to delete rows"))?;
        Ok(deleted)
    }

    async fn delete_expired(&self, layer: CacheLayer, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        // Timestamps are stored in milliseconds; ttl_seconds = 0 means
        // never expire.
        self.delete_returning_ids(
            layer,
            "ttl_seconds > 0 AND created_at + ttl_seconds * 1000 <= ?",
            vec![Value::from(now.timestamp_millis())],
        )
        .await
    }

    async fn delete_by_source_version(&self, layer: CacheLayer, version: &str) -> Result<Vec<Uuid>> {
        self.delete_returning_ids(
            layer,
            "source_version = ?",
            vec![Value::from(version.to_string())],
        )
        .await
    }

    async fn delete_by_scope(&self, layer: CacheLayer, scope: &ScopeTag) -> Result<Vec<Uuid>> {
        self.delete_returning_ids(layer, "scope_tag = ?", vec![Value::from(scope.encode())])
            .await
    }

    async fn delete_by_query_substring(&self, layer: CacheLayer, needle: &str) -> Result<Vec<Uuid>> {
        self.delete_returning_ids(
            layer,
            r"query_text LIKE '%' || ? || '%' ESCAPE '\'",
            vec![Value::from(escape_like(needle))],
        )
        .await
    }

    async fn count(&self, layer: CacheLayer) -> Result<u64> {
        let conn = self.connect()?;
        let sql = format!("SELECT COUNT(*) FROM {}", layer.table_name());
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(storage_err("Failed to count rows"))?;
        let row = rows
            .next()
            .await
            .map_err(storage_err("Failed to fetch count"))?
            .ok_or_else(|| Error::Storage("count query returned no row".into()))?;
        let count: i64 = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    async fn iter_ids_by_last_accessed(
        &self,
        layer: CacheLayer,
        ascending: bool,
        limit: usize,
    ) -> Result<Vec<Uuid>> {
        let conn = self.connect()?;
        let direction = if ascending { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT id FROM {} ORDER BY last_accessed_at {direction}, id {direction} LIMIT ?",
            layer.table_name(),
        );
        let mut rows = conn
            .query(&sql, params![limit as i64])
            .await
            .map_err(storage_err("Failed to iterate ids"))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(storage_err("Failed to fetch id row"))?
        {
            let raw: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
            ids.push(
                Uuid::parse_str(&raw)
                    .map_err(|e| Error::Storage(format!("invalid entry id: {e}")))?,
            );
        }
        Ok(ids)
    }

    async fn load_access_info(&self, layer: CacheLayer) -> Result<Vec<AccessInfo>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT id, last_accessed_at, access_count, created_at FROM {}",
            layer.table_name()
        );
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(storage_err("Failed to load access info"))?;

        let mut infos = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(storage_err("Failed to fetch access info row"))?
        {
            let raw_id: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
            let last_accessed: i64 = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
            let access_count: i64 = row.get(2).map_err(|e| Error::Storage(e.to_string()))?;
            let created_at: i64 = row.get(3).map_err(|e| Error::Storage(e.to_string()))?;
            infos.push(AccessInfo {
                id: Uuid::parse_str(&raw_id)
                    .map_err(|e| Error::Storage(format!("invalid entry id: {e}")))?,
                last_accessed_at: DateTime::from_timestamp_millis(last_accessed)
                    .unwrap_or_default(),
                access_count: access_count.max(0) as u64,
                created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
            });
        }
        Ok(infos)
    }

    async fn load_layer(&self, layer: CacheLayer) -> Result<Vec<(Uuid, Vec<f32>, ScopeTag)>> {
        let conn = self.connect()?;
        let sql = format!("SELECT id, embedding, scope_tag FROM {}", layer.table_name());
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(storage_err("Failed to load layer"))?;

        let mut live = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(storage_err("Failed to fetch layer row"))?
        {
            let raw_id: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
            let blob: Vec<u8> = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
            let scope_raw: String = row.get(2).map_err(|e| Error::Storage(e.to_string()))?;
            live.push((
                Uuid::parse_str(&raw_id)
                    .map_err(|e| Error::Storage(format!("invalid entry id: {e}")))?,
                crate::rows::blob_to_embedding(&blob)?,
                ScopeTag::decode(&scope_raw)
                    .map_err(|raw| Error::Storage(format!("invalid scope tag: {raw}")))?,
            ));
        }
        Ok(live)
    }

    async fn get_dimension(&self) -> Result<Option<usize>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT value FROM cache_metadata WHERE key = ?",
                params![METADATA_DIMENSION],
            )
            .await
            .map_err(storage_err("Failed to read metadata"))?;

        match rows
            .next()
            .await
            .map_err(storage_err("Failed to fetch metadata row"))?
        {
            None => Ok(None),
            Some(row) => {
                let raw: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
                raw.parse::<usize>()
                    .map(Some)
                    .map_err(|e| Error::Storage(format!("invalid stored dimension: {e}")))
            }
        }
    }

    async fn set_dimension(&self, dimension: usize) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES (?, ?)",
            params![METADATA_DIMENSION, dimension.to_string()],
        )
        .await
        .map_err(storage_err("Failed to write metadata"))?;
        Ok(())
    }

    async fn record_daily_stats(&self, stats: &DailyStats) -> Result<()> {
        let conn = self.connect()?;
        let sql = r#"
            INSERT INTO daily_stats (
                date, total_queries, l1_hits, l2_hits, l3_hits,
                misses, tokens_saved, estimated_cost_saved
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                total_queries = total_queries + excluded.total_queries,
                l1_hits = l1_hits + excluded.l1_hits,
                l2_hits = l2_hits + excluded.l2_hits,
                l3_hits = l3_hits + excluded.l3_hits,
                misses = misses + excluded.misses,
                tokens_saved = tokens_saved + excluded.tokens_saved,
                estimated_cost_saved = estimated_cost_saved + excluded.estimated_cost_saved
        "#;
        conn.execute(
            sql,
            params![
                stats.date.format("%Y-%m-%d").to_string(),
                stats.total_queries as i64,
                stats.l1_hits as i64,
                stats.l2_hits as i64,
                stats.l3_hits as i64,
                stats.misses as i64,
                stats.tokens_saved as i64,
                stats.estimated_cost_saved,
            ],
        )
        .await
        .map_err(storage_err("Failed to record daily stats"))?;
        Ok(())
    }

    async fn load_daily_stats(&self, date: NaiveDate) -> Result<Option<DailyStats>> {
        let conn = self.connect()?;
        let sql = r#"
            SELECT total_queries, l1_hits, l2_hits, l3_hits,
                   misses, tokens_saved, estimated_cost_saved
            FROM daily_stats WHERE date = ?
        "#;
        let mut rows = conn
            .query(sql, params![date.format("%Y-%m-%d").to_string()])
            .await
            .map_err(storage_err("Failed to load daily stats"))?;

        match rows
            .next()
            .await
            .map_err(storage_err("Failed to fetch stats row"))?
        {
            None => Ok(None),
            Some(row) => {
                let total_queries: i64 = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
                let l1_hits: i64 = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
                let l2_hits: i64 = row.get(2).map_err(|e| Error::Storage(e.to_string()))?;
                let l3_hits: i64 = row.get(3).map_err(|e| Error::Storage(e.to_string()))?;
                let misses: i64 = row.get(4).map_err(|e| Error::Storage(e.to_string()))?;
                let tokens_saved: i64 = row.get(5).map_err(|e| Error::Storage(e.to_string()))?;
                let estimated_cost_saved: f64 =
                    row.get(6).map_err(|e| Error::Storage(e.to_string()))?;
                Ok(Some(DailyStats {
                    date,
                    total_queries: total_queries.max(0) as u64,
                    l1_hits: l1_hits.max(0) as u64,
                    l2_hits: l2_hits.max(0) as u64,
                    l3_hits: l3_hits.max(0) as u64,
                    misses: misses.max(0) as u64,
                    tokens_saved: tokens_saved.max(0) as u64,
                    estimated_cost_saved,
                }))
            }
        }
    }
}
