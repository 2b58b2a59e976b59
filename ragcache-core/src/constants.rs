//! Default tunables shared across the cache core.

use std::time::Duration;

/// Default cosine similarity threshold for answer-layer (L1) hits
pub const DEFAULT_ANSWER_THRESHOLD: f32 = 0.90;

/// Default cosine similarity threshold for compressed-context-layer (L2) hits
pub const DEFAULT_COMPRESSED_THRESHOLD: f32 = 0.85;

/// Default cosine similarity threshold for chunk-layer (L3) hits
pub const DEFAULT_CHUNKS_THRESHOLD: f32 = 0.80;

/// Default number of ANN candidates fetched per layer
pub const DEFAULT_TOP_K: usize = 8;

/// Default answer-layer entry cap
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Fraction of `max_entries` the cache is trimmed down to on eviction
pub const DEFAULT_LOW_WATERMARK: f64 = 0.9;

/// Default entry lifetime in seconds (0 means never expire)
pub const DEFAULT_TTL_SECONDS: i64 = 7 * 24 * 3600;

/// Default interval between TTL sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Live-set size above which the vector index switches from linear scan
/// to partitioned approximate search
pub const DEFAULT_BRUTE_FORCE_CUTOFF: usize = 2_000;

/// Default number of partitions probed per approximate search
pub const DEFAULT_NPROBE: usize = 4;

/// Tombstone fraction of live size that triggers a partition rebuild
pub const TOMBSTONE_REBUILD_FRACTION: f64 = 0.20;

/// Minimum acceptable recall@k of the approximate index against brute force
pub const MIN_INDEX_RECALL: f64 = 0.95;

/// Default eviction ranking weight for recency
pub const DEFAULT_RECENCY_WEIGHT: f64 = 0.7;

/// Default eviction ranking weight for access frequency
pub const DEFAULT_FREQUENCY_WEIGHT: f64 = 0.3;

/// Eviction batch size as a fraction of `max_entries`
pub const EVICTION_BATCH_FRACTION: f64 = 0.05;

/// Default per-call embedding timeout
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum embedding input length in characters
pub const DEFAULT_MAX_INPUT_CHARS: usize = 16_384;

/// Default blended price used to estimate cost savings, in USD per 1k tokens
pub const DEFAULT_COST_PER_1K_TOKENS: f64 = 0.002;

/// Tolerance on the L2 norm of embeddings accepted by the gateway
pub const NORM_TOLERANCE: f32 = 1e-5;
