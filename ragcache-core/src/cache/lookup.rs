//! Multi-layer lookup protocol.

use super::SemanticCache;
use crate::types::{CacheEntry, CacheLayer, HealthState, LookupResult, ScopeTag};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

impl SemanticCache {
    /// Look up a semantically equivalent cached result for `query_text`.
    ///
    /// Walks the layers in order (L1 answers, L2 compressed contexts, L3
    /// chunk sets) and returns the first eligible hit. Internal errors never
    /// escalate: embedding, index, or store failures degrade to
    /// [`LookupResult::Miss`] and the pipeline answers the query as if the
    /// cache were cold.
    ///
    /// Sensitive queries miss without touching the store.
    pub async fn lookup(&self, query_text: &str, scope: &ScopeTag) -> LookupResult {
        if self.sensitive_rules.is_sensitive(query_text) {
            debug!("sensitive query, bypassing cache");
            self.stats.record_miss();
            return LookupResult::Miss;
        }

        if self.stats.health() == HealthState::StoreUnavailable {
            self.stats.record_miss();
            return LookupResult::Miss;
        }

        let embedding = match self.gateway.embed(query_text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                debug!(error = %e, "embedding failed, bypassing cache");
                self.stats.record_miss();
                return LookupResult::Miss;
            }
        };

        let current_version = match self.refresh_version().await {
            Ok(version) => version,
            Err(e) => {
                warn!(error = %e, "source version unavailable, treating lookup as miss");
                self.stats.record_miss();
                return LookupResult::Miss;
            }
        };

        let degraded = self.stats.health() == HealthState::CoherenceDegraded;
        let required_version = degraded.then_some(current_version.as_str());
        let version_state = self.version_state.lock().clone();
        let now = Utc::now();

        for layer in CacheLayer::ALL {
            let threshold = self.config.similarity_thresholds.for_layer(layer);

            // Shared read lock only for the ANN search; fetched rows are
            // re-verified against the committed snapshot afterwards.
            let candidates = {
                let index = self.index(layer).read().await;
                index.search(&embedding, self.config.top_k, scope)
            };

            // Thresholds are inclusive; no fallback to lower thresholds.
            let surviving: Vec<(Uuid, f32)> = candidates
                .into_iter()
                .filter(|c| c.score >= threshold)
                .map(|c| (c.id, c.score))
                .collect();
            if surviving.is_empty() {
                continue;
            }

            let ids: Vec<Uuid> = surviving.iter().map(|(id, _)| *id).collect();
            let rows = match self.store.fetch_by_ids(layer, &ids, required_version).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(%layer, error = %e, "store read failed during lookup, degrading to miss");
                    continue;
                }
            };

            if rows.is_empty() && required_version.is_none() {
                // The index produced ids the store does not have: stale
                // index or racing deletes. Rebuild so the next lookup sees
                // a consistent pair; this one misses the layer.
                let inconsistency = crate::error::Error::IndexInconsistent(format!(
                    "{} candidate ids missing from the store",
                    ids.len()
                ));
                warn!(%layer, error = %inconsistency, "rebuilding index from store");
                if let Err(e) = self.rebuild_index(layer).await {
                    warn!(%layer, error = %e, "index rebuild failed");
                }
                continue;
            }

            let mut eligible: Vec<(f32, CacheEntry)> = rows
                .into_iter()
                .filter(|row| {
                    let header = row.header();
                    header.scope.visible_to(scope)
                        && !header.is_expired(now)
                        && self.version_accepts(&version_state, &header.source_version, now)
                })
                .filter_map(|row| {
                    let score = surviving
                        .iter()
                        .find(|(id, _)| *id == row.header().id)
                        .map(|(_, score)| *score)?;
                    Some((score, row))
                })
                .collect();
            if eligible.is_empty() {
                continue;
            }

            // Highest similarity wins; ties broken by most recent access,
            // then most recent creation, then id.
            eligible.sort_by(|a, b| {
                b.0.partial_cmp(&a.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.1.header().last_accessed_at.cmp(&a.1.header().last_accessed_at))
                    .then_with(|| b.1.header().created_at.cmp(&a.1.header().created_at))
                    .then_with(|| a.1.header().id.cmp(&b.1.header().id))
            });
            let (similarity, chosen) = eligible.swap_remove(0);

            if let Err(e) = self
                .store
                .update_access(layer, chosen.header().id, now)
                .await
            {
                warn!(%layer, error = %e, "access bump failed");
            }

            debug!(%layer, similarity, id = %chosen.header().id, "cache hit");
            self.stats.record_hit(
                layer,
                chosen.header().token_count,
                self.config.cost_per_1k_tokens,
            );

            return match chosen {
                CacheEntry::Answer(record) => LookupResult::AnswerHit {
                    age_seconds: record.header.age_seconds(now),
                    answer_text: record.answer_text,
                    similarity,
                    producing_agent: record.header.producing_agent,
                    token_count: record.header.token_count,
                },
                CacheEntry::Compressed(record) => LookupResult::CompressedHit {
                    compressed_context: record.compressed_context,
                    chunk_ids: record.referenced_chunk_ids,
                    similarity,
                },
                CacheEntry::Chunks(record) => LookupResult::ChunksHit {
                    chunk_ids: record.chunk_ids,
                    chunk_scores: record.chunk_scores,
                    similarity,
                },
            };
        }

        self.stats.record_miss();
        LookupResult::Miss
    }
}
