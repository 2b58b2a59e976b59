//! Write-through store protocol and capacity enforcement.

use super::SemanticCache;
use crate::error::{Error, Result};
use crate::types::{
    derive_entry_id, AnswerRecord, CacheEntry, CacheLayer, ChunkRecord, CompressedRecord,
    EntryHeader, HealthState, ScopeTag, StoreMetadata,
};
use chrono::Utc;
use tracing::{debug, error, info, warn};

impl SemanticCache {
    /// Store a generated answer (L1) for `query_text`.
    ///
    /// Skipped silently when the query or the answer is sensitive, when the
    /// embedding is unavailable, or when an identical live entry already
    /// exists under the same source version (first answer wins). Cache-write
    /// failures are logged and dropped: the pipeline has already served the
    /// user.
    ///
    /// # Errors
    ///
    /// Only contract violations surface: a negative TTL or a `Global` scope
    /// under a non-shared isolation mode return `Error::InvalidInput`.
    pub async fn store_answer(
        &self,
        query_text: &str,
        scope: &ScopeTag,
        answer_text: &str,
        metadata: StoreMetadata,
    ) -> Result<()> {
        self.validate_store(scope, &metadata)?;

        if self.sensitive_rules.is_sensitive(answer_text) {
            debug!("sensitive answer, skipping store");
            return Ok(());
        }

        let Some(header) = self.prepare_header(query_text, scope, &metadata).await else {
            return Ok(());
        };
        self.write_through(CacheEntry::Answer(AnswerRecord {
            header,
            answer_text: answer_text.to_string(),
        }))
        .await;
        Ok(())
    }

    /// Store a compressed/analyzed context (L2) for `query_text`.
    ///
    /// The compressed payload is scanned by the sensitive-content rules;
    /// chunk ids are opaque references and are not.
    ///
    /// # Errors
    ///
    /// Same contract violations as [`store_answer`](Self::store_answer).
    pub async fn store_compressed(
        &self,
        query_text: &str,
        scope: &ScopeTag,
        compressed_context: &str,
        referenced_chunk_ids: Vec<String>,
        metadata: StoreMetadata,
    ) -> Result<()> {
        self.validate_store(scope, &metadata)?;

        if self.sensitive_rules.is_sensitive(compressed_context) {
            debug!("sensitive compressed context, skipping store");
            return Ok(());
        }

        let Some(header) = self.prepare_header(query_text, scope, &metadata).await else {
            return Ok(());
        };
        self.write_through(CacheEntry::Compressed(CompressedRecord {
            header,
            compressed_context: compressed_context.to_string(),
            referenced_chunk_ids,
        }))
        .await;
        Ok(())
    }

    /// Store a retrieved chunk-id set (L3) for `query_text`.
    ///
    /// # Errors
    ///
    /// Contract violations as [`store_answer`](Self::store_answer), plus
    /// `Error::InvalidInput` when `chunk_scores` is not parallel to
    /// `chunk_ids`.
    pub async fn store_chunks(
        &self,
        query_text: &str,
        scope: &ScopeTag,
        chunk_ids: Vec<String>,
        chunk_scores: Vec<f32>,
        metadata: StoreMetadata,
    ) -> Result<()> {
        self.validate_store(scope, &metadata)?;
        if chunk_ids.len() != chunk_scores.len() {
            return Err(Error::InvalidInput(format!(
                "chunk_scores length {} does not match chunk_ids length {}",
                chunk_scores.len(),
                chunk_ids.len()
            )));
        }

        let Some(header) = self.prepare_header(query_text, scope, &metadata).await else {
            return Ok(());
        };
        self.write_through(CacheEntry::Chunks(ChunkRecord {
            header,
            chunk_ids,
            chunk_scores,
        }))
        .await;
        Ok(())
    }

    /// Contract checks shared by all store operations.
    fn validate_store(&self, scope: &ScopeTag, metadata: &StoreMetadata) -> Result<()> {
        if let Some(ttl) = metadata.ttl_seconds {
            if ttl < 0 {
                return Err(Error::InvalidInput(format!("negative ttl_seconds: {ttl}")));
            }
        }
        if *scope == ScopeTag::Global
            && self.config.isolation != crate::config::Isolation::Shared
        {
            return Err(Error::InvalidInput(
                "global scope requires isolation = shared".into(),
            ));
        }
        Ok(())
    }

    /// Build the shared header, or `None` when the store should be skipped
    /// silently (sensitive query, embedding failure, store unavailable).
    async fn prepare_header(
        &self,
        query_text: &str,
        scope: &ScopeTag,
        metadata: &StoreMetadata,
    ) -> Option<EntryHeader> {
        if self.stats.health() == HealthState::StoreUnavailable {
            return None;
        }
        if self.sensitive_rules.is_sensitive(query_text) {
            debug!("sensitive query, skipping store");
            return None;
        }

        let embedding = match self.gateway.embed(query_text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                debug!(error = %e, "embedding failed, skipping store");
                return None;
            }
        };

        let now = Utc::now();
        Some(EntryHeader {
            id: derive_entry_id(query_text, scope),
            query_text: query_text.to_string(),
            scope: scope.clone(),
            embedding,
            producing_agent: metadata.producing_agent.clone(),
            token_count: metadata.token_count,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
            ttl_seconds: metadata.ttl_seconds.unwrap_or(self.config.ttl_seconds_default),
            source_version: metadata.source_version.clone(),
        })
    }

    /// Commit the entry and mirror it into the layer index, then enforce
    /// the capacity cap. Never surfaces cache-internal errors.
    async fn write_through(&self, entry: CacheEntry) {
        let layer = entry.layer();
        if let Err(e) = self.store_entry(entry).await {
            match e {
                Error::StoreUnavailable => self.escalate_store_unavailable(),
                e => warn!(%layer, error = %e, "cache write failed, dropping"),
            }
            return;
        }

        if let Err(e) = self.maybe_evict().await {
            warn!(error = %e, "eviction pass failed");
        }
    }

    /// Serialized write of one entry: store commit first, index second,
    /// both under the layer writer lock.
    async fn store_entry(&self, entry: CacheEntry) -> Result<()> {
        let layer = entry.layer();
        let header = entry.header();
        let id = header.id;

        let mut index = self.index(layer).write().await;

        let existing = self.store.fetch_by_ids(layer, &[id], None).await?;
        if let Some(prev) = existing.first() {
            let prev_header = prev.header();
            if !prev_header.is_expired(Utc::now())
                && prev_header.source_version == header.source_version
            {
                // First answer wins per source version.
                debug!(%layer, %id, "live entry already present for this source version, dropping write");
                return Ok(());
            }
        }

        self.store.insert_or_replace(&entry).await?;
        index.add(id, header.embedding.clone(), header.scope.clone());
        debug!(%layer, %id, scope = %header.scope, "stored cache entry");
        Ok(())
    }

    /// Evict the coldest answer entries (and their derived L2/L3 rows) when
    /// the answer layer exceeds its cap.
    pub(crate) async fn maybe_evict(&self) -> Result<()> {
        let count = self.store.count(CacheLayer::Answer).await? as usize;
        if !self.planner.over_capacity(count) {
            return Ok(());
        }

        let entries = self.store.load_access_info(CacheLayer::Answer).await?;
        let victims = self.planner.plan_evictions(&entries, Utc::now());
        if victims.is_empty() {
            return Ok(());
        }

        // Delete in batches so no single statement grows with the cap.
        let batch_size = ((self.config.max_entries as f64
            * crate::constants::EVICTION_BATCH_FRACTION)
            .ceil() as usize)
            .max(1);

        for layer in CacheLayer::ALL {
            let mut index = self.index(layer).write().await;
            for batch in victims.chunks(batch_size) {
                self.store.delete_by_ids(layer, batch).await?;
                index.remove_all(batch);
            }
        }

        info!(evicted = victims.len(), remaining = count - victims.len(), "capacity eviction");
        Ok(())
    }

    pub(crate) fn escalate_store_unavailable(&self) {
        if self.stats.health() != HealthState::StoreUnavailable {
            error!("persistent store unavailable, cache is now pass-through");
            self.stats.set_health(HealthState::StoreUnavailable);
        }
    }
}
