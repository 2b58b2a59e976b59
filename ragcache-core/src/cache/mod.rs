//! # Semantic Cache Orchestrator
//!
//! Multi-layer lookup/store protocol over the vector indexes and the
//! persistent store.
//!
//! A lookup walks the layers in order (answers, compressed contexts, chunk
//! sets) and short-circuits on the first eligible candidate; a miss lets the
//! pipeline run and feed results back layer by layer. The orchestrator owns
//! the index and store handles: one writer lock per layer protects the
//! `(index, store)` pair so the two cannot diverge, while lookups take the
//! shared side of the lock and verify fetched rows against the committed
//! snapshot.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ragcache_core::cache::SemanticCache;
//! use ragcache_core::config::CacheConfig;
//! use ragcache_core::embeddings::MockEmbedder;
//! use ragcache_core::store::MemoryStore;
//! use ragcache_core::types::{LookupResult, ScopeTag, StoreMetadata};
//! use ragcache_core::version::StaticVersionProvider;
//!
//! #[tokio::main]
//! async fn main() -> ragcache_core::Result<()> {
//!     let cache = SemanticCache::new(
//!         CacheConfig::new(384),
//!         Arc::new(MockEmbedder::new(384)),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(StaticVersionProvider::new("v1")),
//!     )
//!     .await?;
//!
//!     match cache.lookup("What is life?", &ScopeTag::Global).await {
//!         LookupResult::AnswerHit { answer_text, .. } => println!("cached: {answer_text}"),
//!         _ => {
//!             // Run the pipeline, then feed the cache back.
//!             let metadata = StoreMetadata::new("llm-backend", 1000, "v1");
//!             cache
//!                 .store_answer("What is life?", &ScopeTag::Global, "42", metadata)
//!                 .await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod invalidate;
mod lookup;
mod maintenance;
mod store_ops;
#[cfg(test)]
mod tests;

use crate::capacity::CapacityPlanner;
use crate::config::{CacheConfig, SourceVersionMode};
use crate::embeddings::{EmbeddingGateway, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::safety::SensitiveRules;
use crate::stats::{StatsRecorder, StatsSnapshot};
use crate::store::CacheStore;
use crate::types::{CacheLayer, HealthState};
use crate::version::SourceVersionProvider;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Knowledge-base version bookkeeping for grace-mode acceptance.
#[derive(Debug, Clone)]
pub(crate) struct VersionState {
    pub current: String,
    pub previous: Option<String>,
    pub switched_at: DateTime<Utc>,
}

/// Multi-tier semantic cache orchestrator.
///
/// Construct with [`SemanticCache::new`]; the instance is cheap to share via
/// `Arc`. Configuration is immutable for the lifetime of the orchestrator;
/// to change thresholds or TTLs, build a new orchestrator over the same
/// store and swap atomically at the call site.
pub struct SemanticCache {
    pub(crate) config: CacheConfig,
    pub(crate) gateway: EmbeddingGateway,
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) version_provider: Arc<dyn SourceVersionProvider>,
    pub(crate) sensitive_rules: SensitiveRules,
    pub(crate) planner: CapacityPlanner,
    pub(crate) stats: Arc<StatsRecorder>,
    answer_index: RwLock<VectorIndex>,
    compressed_index: RwLock<VectorIndex>,
    chunks_index: RwLock<VectorIndex>,
    pub(crate) version_state: parking_lot::Mutex<VersionState>,
    /// Invalidation operations that exhausted their retries; the cache is
    /// coherence-degraded until each completes on a later call.
    pub(crate) pending_invalidations: parking_lot::Mutex<HashSet<String>>,
}

impl SemanticCache {
    /// Build and initialize a cache over the given collaborators.
    ///
    /// Initialization verifies the stored embedding dimension against the
    /// configuration (recording it on first use), rebuilds every vector
    /// index from the store, and runs the index recall self-test.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidConfig` when the configuration is inconsistent
    /// - `Error::DimensionMismatch` when the provider or the store disagree
    ///   with the configured dimension
    /// - `Error::Storage` when the store cannot be read
    pub async fn new(
        config: CacheConfig,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn CacheStore>,
        version_provider: Arc<dyn SourceVersionProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let gateway = EmbeddingGateway::new(
            provider,
            config.dimension,
            config.embed_timeout,
            config.max_input_chars,
        )?;

        match store.get_dimension().await? {
            None => store.set_dimension(config.dimension).await?,
            Some(stored) if stored != config.dimension => {
                return Err(Error::DimensionMismatch {
                    expected: config.dimension,
                    actual: stored,
                });
            }
            Some(_) => {}
        }

        let current = version_provider
            .current()
            .await
            .map_err(|e| Error::SourceVersion(e.to_string()))?;

        let planner = CapacityPlanner::new(
            config.max_entries,
            config.low_watermark,
            config.eviction_weights,
        );

        let new_index =
            || VectorIndex::new(config.dimension, config.brute_force_cutoff, config.nprobe);

        let cache = Self {
            sensitive_rules: SensitiveRules::builtin(),
            gateway,
            store,
            version_provider,
            planner,
            stats: Arc::new(StatsRecorder::new()),
            answer_index: RwLock::new(new_index()),
            compressed_index: RwLock::new(new_index()),
            chunks_index: RwLock::new(new_index()),
            version_state: parking_lot::Mutex::new(VersionState {
                current,
                previous: None,
                switched_at: Utc::now(),
            }),
            pending_invalidations: parking_lot::Mutex::new(HashSet::new()),
            config,
        };

        if cache.config.sensitive_rules_version != cache.sensitive_rules.version() {
            warn!(
                configured = %cache.config.sensitive_rules_version,
                active = %cache.sensitive_rules.version(),
                "configured sensitive ruleset version differs from the active ruleset; install it with with_sensitive_rules"
            );
        }

        for layer in CacheLayer::ALL {
            cache.rebuild_index(layer).await?;
        }
        cache.run_recall_self_test().await;

        info!(
            dimension = cache.config.dimension,
            model = cache.gateway.model_name(),
            "semantic cache initialized"
        );
        Ok(cache)
    }

    /// Replace the built-in sensitive ruleset.
    #[must_use]
    pub fn with_sensitive_rules(mut self, rules: SensitiveRules) -> Self {
        self.sensitive_rules = rules;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Lock-free snapshot of the cache counters and health signal.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Current operational health.
    #[must_use]
    pub fn health(&self) -> HealthState {
        self.stats.health()
    }

    pub(crate) fn index(&self, layer: CacheLayer) -> &RwLock<VectorIndex> {
        match layer {
            CacheLayer::Answer => &self.answer_index,
            CacheLayer::Compressed => &self.compressed_index,
            CacheLayer::Chunks => &self.chunks_index,
        }
    }

    /// Ask the provider for the current version, tracking switches for
    /// grace-mode acceptance. Returns the current tag.
    pub(crate) async fn refresh_version(&self) -> Result<String> {
        let fresh = self
            .version_provider
            .current()
            .await
            .map_err(|e| Error::SourceVersion(e.to_string()))?;

        let mut state = self.version_state.lock();
        if state.current != fresh {
            info!(from = %state.current, to = %fresh, "source version switched");
            state.previous = Some(std::mem::replace(&mut state.current, fresh.clone()));
            state.switched_at = Utc::now();
        }
        Ok(fresh)
    }

    /// Whether a row stamped `row_version` is acceptable under the current
    /// version state and configured mode.
    pub(crate) fn version_accepts(
        &self,
        state: &VersionState,
        row_version: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if row_version == state.current {
            return true;
        }
        match self.config.source_version_mode {
            SourceVersionMode::Strict => false,
            SourceVersionMode::Grace(seconds) => {
                state.previous.as_deref() == Some(row_version)
                    && (now - state.switched_at).num_seconds() <= seconds as i64
            }
        }
    }

    pub(crate) fn note_invalidation_failure(&self, op: String) {
        warn!(op = %op, "invalidation exhausted retries, cache is coherence-degraded");
        self.pending_invalidations.lock().insert(op);
        if self.stats.health() == HealthState::Healthy {
            self.stats.set_health(HealthState::CoherenceDegraded);
        }
    }

    pub(crate) fn note_invalidation_success(&self, op: &str) {
        let mut pending = self.pending_invalidations.lock();
        if pending.remove(op)
            && pending.is_empty()
            && self.stats.health() == HealthState::CoherenceDegraded
        {
            info!(op = %op, "pending invalidation completed, coherence restored");
            self.stats.set_health(HealthState::Healthy);
        }
    }
}
