//! Immutable cache configuration.
//!
//! A [`CacheConfig`] is passed to the orchestrator at construction and never
//! mutated afterwards. Runtime changes (thresholds, TTL) are handled by
//! constructing a new orchestrator over the same store and swapping
//! atomically at the call site.

use crate::constants;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-layer cosine similarity thresholds, in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    /// L1 answer-hit threshold
    pub answer: f32,
    /// L2 compressed-context threshold
    pub compressed: f32,
    /// L3 chunk-set threshold
    pub chunks: f32,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            answer: constants::DEFAULT_ANSWER_THRESHOLD,
            compressed: constants::DEFAULT_COMPRESSED_THRESHOLD,
            chunks: constants::DEFAULT_CHUNKS_THRESHOLD,
        }
    }
}

impl SimilarityThresholds {
    /// Threshold for a given layer.
    #[must_use]
    pub fn for_layer(&self, layer: crate::types::CacheLayer) -> f32 {
        match layer {
            crate::types::CacheLayer::Answer => self.answer,
            crate::types::CacheLayer::Compressed => self.compressed,
            crate::types::CacheLayer::Chunks => self.chunks,
        }
    }
}

/// Eviction ranking weights.
///
/// `rank = recency * normalize(now - last_accessed_at)
///        + frequency * 1 / (1 + access_count)`;
/// the lowest-ranked entries are evicted first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvictionWeights {
    /// Weight of the recency term
    pub recency: f64,
    /// Weight of the frequency term
    pub frequency: f64,
}

impl Default for EvictionWeights {
    fn default() -> Self {
        Self {
            recency: constants::DEFAULT_RECENCY_WEIGHT,
            frequency: constants::DEFAULT_FREQUENCY_WEIGHT,
        }
    }
}

/// Tenant isolation mode of the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Isolation {
    /// Entries may be stored under the `Global` scope and shared
    #[default]
    Shared,
    /// Every entry carries the calling user's scope
    PerUser,
    /// Every entry carries the calling organization's scope
    PerOrg,
}

/// How strictly entry `source_version` must match the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceVersionMode {
    /// Only entries stamped with the current version are eligible
    #[default]
    Strict,
    /// Entries stamped with the immediately previous version stay eligible
    /// for this many seconds after the version switch is observed
    Grace(u64),
}

/// Retry tuning for invalidation operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvalidationRetry {
    /// Maximum retry attempts after the first failure
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay
    pub max_delay: Duration,
}

impl Default for InvalidationRetry {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Complete configuration of a semantic cache instance.
///
/// # Examples
///
/// ```
/// use ragcache_core::config::{CacheConfig, Isolation};
///
/// let config = CacheConfig::new(384)
///     .with_max_entries(5_000)
///     .with_isolation(Isolation::PerUser);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Embedding dimension; fixed per cache, changing it invalidates all entries
    pub dimension: usize,
    /// Per-layer hit thresholds
    pub similarity_thresholds: SimilarityThresholds,
    /// ANN candidates fetched per layer
    pub top_k: usize,
    /// Answer-layer entry cap (L2/L3 track L1 through shared ids)
    pub max_entries: usize,
    /// Fraction of `max_entries` kept after an eviction pass
    pub low_watermark: f64,
    /// Default entry lifetime in seconds; 0 means never expire
    pub ttl_seconds_default: i64,
    /// Interval between background TTL sweeps
    pub ttl_sweep_interval: Duration,
    /// Tenant isolation mode
    pub isolation: Isolation,
    /// Version label of the active sensitive-content ruleset
    pub sensitive_rules_version: String,
    /// Source-version matching mode
    pub source_version_mode: SourceVersionMode,
    /// Live-set size above which approximate search replaces linear scan
    pub brute_force_cutoff: usize,
    /// Partitions probed per approximate search
    pub nprobe: usize,
    /// Eviction ranking weights
    pub eviction_weights: EvictionWeights,
    /// Per-call embedding timeout
    pub embed_timeout: Duration,
    /// Maximum embedding input length in characters
    pub max_input_chars: usize,
    /// Blended USD price per 1k tokens used for cost-savings estimates
    pub cost_per_1k_tokens: f64,
    /// Retry tuning for invalidation
    pub invalidation_retry: InvalidationRetry,
}

impl CacheConfig {
    /// Configuration with the given embedding dimension and all defaults.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            similarity_thresholds: SimilarityThresholds::default(),
            top_k: constants::DEFAULT_TOP_K,
            max_entries: constants::DEFAULT_MAX_ENTRIES,
            low_watermark: constants::DEFAULT_LOW_WATERMARK,
            ttl_seconds_default: constants::DEFAULT_TTL_SECONDS,
            ttl_sweep_interval: constants::DEFAULT_SWEEP_INTERVAL,
            isolation: Isolation::default(),
            sensitive_rules_version: crate::safety::DEFAULT_RULES_VERSION.to_string(),
            source_version_mode: SourceVersionMode::default(),
            brute_force_cutoff: constants::DEFAULT_BRUTE_FORCE_CUTOFF,
            nprobe: constants::DEFAULT_NPROBE,
            eviction_weights: EvictionWeights::default(),
            embed_timeout: constants::DEFAULT_EMBED_TIMEOUT,
            max_input_chars: constants::DEFAULT_MAX_INPUT_CHARS,
            cost_per_1k_tokens: constants::DEFAULT_COST_PER_1K_TOKENS,
            invalidation_retry: InvalidationRetry::default(),
        }
    }

    /// Set per-layer similarity thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: SimilarityThresholds) -> Self {
        self.similarity_thresholds = thresholds;
        self
    }

    /// Set the ANN candidate count.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the answer-layer entry cap.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the post-eviction watermark fraction.
    #[must_use]
    pub fn with_low_watermark(mut self, low_watermark: f64) -> Self {
        self.low_watermark = low_watermark;
        self
    }

    /// Set the default TTL in seconds (0 = never expire).
    #[must_use]
    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds_default = ttl_seconds;
        self
    }

    /// Set the TTL sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.ttl_sweep_interval = interval;
        self
    }

    /// Set the isolation mode.
    #[must_use]
    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set the source-version matching mode.
    #[must_use]
    pub fn with_source_version_mode(mut self, mode: SourceVersionMode) -> Self {
        self.source_version_mode = mode;
        self
    }

    /// Set the brute-force cutoff.
    #[must_use]
    pub fn with_brute_force_cutoff(mut self, cutoff: usize) -> Self {
        self.brute_force_cutoff = cutoff;
        self
    }

    /// Set the eviction weights.
    #[must_use]
    pub fn with_eviction_weights(mut self, weights: EvictionWeights) -> Self {
        self.eviction_weights = weights;
        self
    }

    /// Validate internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidConfig("dimension must be positive".into()));
        }
        let t = &self.similarity_thresholds;
        for (name, value) in [
            ("answer", t.answer),
            ("compressed", t.compressed),
            ("chunks", t.chunks),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} threshold {value} outside [0, 1]"
                )));
            }
        }
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be positive".into()));
        }
        if self.max_entries == 0 {
            return Err(Error::InvalidConfig("max_entries must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.low_watermark) || self.low_watermark == 0.0 {
            return Err(Error::InvalidConfig(format!(
                "low_watermark {} outside (0, 1]",
                self.low_watermark
            )));
        }
        if self.ttl_seconds_default < 0 {
            return Err(Error::InvalidConfig("default ttl must not be negative".into()));
        }
        let w = &self.eviction_weights;
        if w.recency < 0.0 || w.frequency < 0.0 || w.recency + w.frequency <= 0.0 {
            return Err(Error::InvalidConfig("eviction weights must be non-negative and sum > 0".into()));
        }
        if self.nprobe == 0 {
            return Err(Error::InvalidConfig("nprobe must be positive".into()));
        }
        Ok(())
    }
}
