//! Common types shared across the semantic cache.
//!
//! The cache stores one record kind per layer, all sharing the same
//! [`EntryHeader`]. Records are modeled as an explicit tagged variant
//! ([`CacheEntry`]) so that store implementations handle every layer through
//! one seam instead of scattered per-layer tables of loosely typed fields.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving deterministic entry ids from `(query_text, scope)`.
///
/// All three layers of one pipeline pass share a single id, which keys
/// cross-layer eviction coherently without the caller threading an id
/// through retrieval, compression, and answer generation.
const ENTRY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8f0c_41d2_9b67_4c55_a1e3_72d4_95bb_3f01);

/// Derive the deterministic entry id for a `(query_text, scope)` pair.
#[must_use]
pub fn derive_entry_id(query_text: &str, scope: &ScopeTag) -> Uuid {
    let key = format!("{}\n{}", scope.encode(), query_text);
    Uuid::new_v5(&ENTRY_ID_NAMESPACE, key.as_bytes())
}

/// Visibility partition of a cache entry.
///
/// `Global` entries are visible to every caller; `User` and `Org` entries
/// are visible only to callers presenting the identical scope. Scope is a
/// required field of every lookup and every stored entry ("global" is just
/// one value, not an absent column).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeTag {
    /// Shared across all callers (only produced under `Isolation::Shared`)
    Global,
    /// Visible to one user
    User(String),
    /// Visible to one organization
    Org(String),
}

impl ScopeTag {
    /// Stable string encoding used in the store and in logs.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            ScopeTag::Global => "global".to_string(),
            ScopeTag::User(id) => format!("user:{id}"),
            ScopeTag::Org(id) => format!("org:{id}"),
        }
    }

    /// Parse the encoding produced by [`ScopeTag::encode`].
    ///
    /// # Errors
    ///
    /// Returns the raw string back when it matches no known encoding.
    pub fn decode(raw: &str) -> std::result::Result<Self, String> {
        if raw == "global" {
            return Ok(ScopeTag::Global);
        }
        if let Some(id) = raw.strip_prefix("user:") {
            return Ok(ScopeTag::User(id.to_string()));
        }
        if let Some(id) = raw.strip_prefix("org:") {
            return Ok(ScopeTag::Org(id.to_string()));
        }
        Err(raw.to_string())
    }

    /// Whether an entry tagged `self` may be returned to a caller
    /// presenting `caller` as its scope.
    ///
    /// Global entries are visible to everyone; scoped entries only to the
    /// identical scope. Applied before similarity thresholding so that
    /// cross-scope candidates never compete for a hit.
    #[must_use]
    pub fn visible_to(&self, caller: &ScopeTag) -> bool {
        match self {
            ScopeTag::Global => true,
            other => other == caller,
        }
    }
}

impl std::fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Cache layer: final answer (L1), compressed context (L2), or raw chunk
/// identifiers (L3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheLayer {
    /// L1 - final answers
    Answer,
    /// L2 - compressed/analyzed contexts
    Compressed,
    /// L3 - retrieved chunk-id sets
    Chunks,
}

impl CacheLayer {
    /// All layers in lookup order (L1 first).
    pub const ALL: [CacheLayer; 3] = [CacheLayer::Answer, CacheLayer::Compressed, CacheLayer::Chunks];

    /// Store table name for this layer.
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            CacheLayer::Answer => "answer_records",
            CacheLayer::Compressed => "compressed_records",
            CacheLayer::Chunks => "chunk_records",
        }
    }
}

impl std::fmt::Display for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CacheLayer::Answer => "L1",
            CacheLayer::Compressed => "L2",
            CacheLayer::Chunks => "L3",
        };
        write!(f, "{label}")
    }
}

/// Shared header of every cache entry regardless of layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Opaque unique id; shared across layers for one `(query, scope)` pair
    pub id: Uuid,
    /// Original query text
    pub query_text: String,
    /// Visibility partition
    pub scope: ScopeTag,
    /// L2-normalized embedding of `query_text`
    pub embedding: Vec<f32>,
    /// Label of the backend that produced the payload
    pub producing_agent: String,
    /// Tokens consumed when the payload was generated (tallies savings)
    pub token_count: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last successful return timestamp
    pub last_accessed_at: DateTime<Utc>,
    /// Number of successful returns (>= 1 for live entries)
    pub access_count: u64,
    /// Entry lifetime in seconds; 0 means never expire
    pub ttl_seconds: i64,
    /// Knowledge-base version tag at generation time
    pub source_version: String,
}

impl EntryHeader {
    /// Whether this entry has outlived its TTL at `now`.
    ///
    /// A TTL of 0 means the entry never expires.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.ttl_seconds == 0 {
            return false;
        }
        self.created_at + chrono::Duration::seconds(self.ttl_seconds) <= now
    }

    /// Age of the entry in whole seconds at `now`.
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds().max(0)
    }
}

/// L1 entry: a final answer for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Shared header
    pub header: EntryHeader,
    /// Answer text returned verbatim on a hit
    pub answer_text: String,
}

/// L2 entry: a reusable compressed/analyzed context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedRecord {
    /// Shared header
    pub header: EntryHeader,
    /// Opaque serialized compressed context
    pub compressed_context: String,
    /// Chunk ids the compression was derived from, in retrieval order
    pub referenced_chunk_ids: Vec<String>,
}

/// L3 entry: a reusable set of retrieved chunk identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Shared header
    pub header: EntryHeader,
    /// Retrieved chunk ids in rank order
    pub chunk_ids: Vec<String>,
    /// Retrieval scores parallel to `chunk_ids`
    pub chunk_scores: Vec<f32>,
}

/// Tagged `(layer, entry)` variant handled by store implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheEntry {
    /// L1 answer record
    Answer(AnswerRecord),
    /// L2 compressed-context record
    Compressed(CompressedRecord),
    /// L3 chunk-id record
    Chunks(ChunkRecord),
}

impl CacheEntry {
    /// The layer this entry belongs to.
    #[must_use]
    pub fn layer(&self) -> CacheLayer {
        match self {
            CacheEntry::Answer(_) => CacheLayer::Answer,
            CacheEntry::Compressed(_) => CacheLayer::Compressed,
            CacheEntry::Chunks(_) => CacheLayer::Chunks,
        }
    }

    /// Shared header, regardless of layer.
    #[must_use]
    pub fn header(&self) -> &EntryHeader {
        match self {
            CacheEntry::Answer(r) => &r.header,
            CacheEntry::Compressed(r) => &r.header,
            CacheEntry::Chunks(r) => &r.header,
        }
    }

    /// Mutable access to the shared header.
    pub fn header_mut(&mut self) -> &mut EntryHeader {
        match self {
            CacheEntry::Answer(r) => &mut r.header,
            CacheEntry::Compressed(r) => &mut r.header,
            CacheEntry::Chunks(r) => &mut r.header,
        }
    }
}

/// Caller-supplied metadata attached to every store operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Label of the backend that produced the payload
    pub producing_agent: String,
    /// Tokens consumed producing the payload
    pub token_count: u64,
    /// Entry lifetime override; `None` uses the configured default
    pub ttl_seconds: Option<i64>,
    /// Knowledge-base version at generation time
    pub source_version: String,
}

impl StoreMetadata {
    /// Convenience constructor for the common case.
    #[must_use]
    pub fn new(producing_agent: impl Into<String>, token_count: u64, source_version: impl Into<String>) -> Self {
        Self {
            producing_agent: producing_agent.into(),
            token_count,
            ttl_seconds: None,
            source_version: source_version.into(),
        }
    }

    /// Set an explicit TTL in seconds (0 = never expire).
    #[must_use]
    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }
}

/// Outcome of a multi-layer cache lookup.
///
/// The cache never escalates internal errors through `lookup`; callers
/// observe exactly one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    /// L1 hit: return the answer directly, skip the whole pipeline
    AnswerHit {
        /// Cached answer text
        answer_text: String,
        /// Cosine similarity between query and cached embedding
        similarity: f32,
        /// Seconds since the entry was created
        age_seconds: i64,
        /// Backend that produced the cached answer
        producing_agent: String,
        /// Tokens the cached generation consumed
        token_count: u64,
    },
    /// L2 hit: skip retrieval and compression
    CompressedHit {
        /// Cached compressed context
        compressed_context: String,
        /// Chunk ids the context was derived from
        chunk_ids: Vec<String>,
        /// Cosine similarity
        similarity: f32,
    },
    /// L3 hit: skip retrieval
    ChunksHit {
        /// Cached chunk ids in rank order
        chunk_ids: Vec<String>,
        /// Retrieval scores parallel to `chunk_ids`
        chunk_scores: Vec<f32>,
        /// Cosine similarity
        similarity: f32,
    },
    /// No layer produced an eligible candidate: run the full pipeline
    Miss,
}

impl LookupResult {
    /// Whether this result is a hit at any layer.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        !matches!(self, LookupResult::Miss)
    }

    /// The layer that produced the hit, if any.
    #[must_use]
    pub fn hit_layer(&self) -> Option<CacheLayer> {
        match self {
            LookupResult::AnswerHit { .. } => Some(CacheLayer::Answer),
            LookupResult::CompressedHit { .. } => Some(CacheLayer::Compressed),
            LookupResult::ChunksHit { .. } => Some(CacheLayer::Chunks),
            LookupResult::Miss => None,
        }
    }
}

/// Per-calendar-day cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    /// UTC calendar day
    pub date: NaiveDate,
    /// Total lookups
    pub total_queries: u64,
    /// L1 hits
    pub l1_hits: u64,
    /// L2 hits
    pub l2_hits: u64,
    /// L3 hits
    pub l3_hits: u64,
    /// Complete misses
    pub misses: u64,
    /// Tokens not re-spent thanks to L1 hits
    pub tokens_saved: u64,
    /// Estimated generation cost avoided, in USD
    pub estimated_cost_saved: f64,
}

impl DailyStats {
    /// Empty bucket for a day.
    #[must_use]
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_queries: 0,
            l1_hits: 0,
            l2_hits: 0,
            l3_hits: 0,
            misses: 0,
            tokens_saved: 0,
            estimated_cost_saved: 0.0,
        }
    }
}

/// Minimal access information for eviction ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessInfo {
    /// Entry id
    pub id: Uuid,
    /// Last successful return
    pub last_accessed_at: DateTime<Utc>,
    /// Number of successful returns
    pub access_count: u64,
    /// Creation time (tie-breaks equal ranks deterministically)
    pub created_at: DateTime<Utc>,
}

/// Operational health of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HealthState {
    /// Index, store, and coherence all nominal
    #[default]
    Healthy,
    /// An invalidation could not complete; lookups add a source-version
    /// predicate at the store layer so stale rows cannot be served
    CoherenceDegraded,
    /// The persistent store is unreachable; lookups miss, stores are dropped
    StoreUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_encoding_round_trip() {
        for scope in [
            ScopeTag::Global,
            ScopeTag::User("alice".into()),
            ScopeTag::Org("acme".into()),
        ] {
            let encoded = scope.encode();
            assert_eq!(ScopeTag::decode(&encoded).unwrap(), scope);
        }
    }

    #[test]
    fn test_scope_decode_rejects_unknown() {
        assert!(ScopeTag::decode("tenant:x").is_err());
        assert!(ScopeTag::decode("").is_err());
    }

    #[test]
    fn test_scope_visibility() {
        let alice = ScopeTag::User("alice".into());
        let bob = ScopeTag::User("bob".into());

        assert!(ScopeTag::Global.visible_to(&alice));
        assert!(ScopeTag::Global.visible_to(&ScopeTag::Global));
        assert!(alice.visible_to(&alice));
        assert!(!alice.visible_to(&bob));
        assert!(!alice.visible_to(&ScopeTag::Global));
        assert!(!ScopeTag::Org("acme".into()).visible_to(&alice));
    }

    #[test]
    fn test_entry_id_deterministic() {
        let a = derive_entry_id("What is life?", &ScopeTag::Global);
        let b = derive_entry_id("What is life?", &ScopeTag::Global);
        assert_eq!(a, b);

        let scoped = derive_entry_id("What is life?", &ScopeTag::User("alice".into()));
        assert_ne!(a, scoped);

        let other = derive_entry_id("What is death?", &ScopeTag::Global);
        assert_ne!(a, other);
    }

    #[test]
    fn test_ttl_zero_never_expires() {
        let now = Utc::now();
        let header = EntryHeader {
            id: Uuid::new_v4(),
            query_text: "q".into(),
            scope: ScopeTag::Global,
            embedding: vec![1.0],
            producing_agent: "test".into(),
            token_count: 0,
            created_at: now - chrono::Duration::days(10_000),
            last_accessed_at: now,
            access_count: 1,
            ttl_seconds: 0,
            source_version: "v1".into(),
        };
        assert!(!header.is_expired(now));
    }

    #[test]
    fn test_ttl_expiry_boundary() {
        let now = Utc::now();
        let mut header = EntryHeader {
            id: Uuid::new_v4(),
            query_text: "q".into(),
            scope: ScopeTag::Global,
            embedding: vec![1.0],
            producing_agent: "test".into(),
            token_count: 0,
            created_at: now - chrono::Duration::seconds(60),
            last_accessed_at: now,
            access_count: 1,
            ttl_seconds: 60,
            source_version: "v1".into(),
        };
        // created_at + ttl == now counts as expired
        assert!(header.is_expired(now));

        header.ttl_seconds = 61;
        assert!(!header.is_expired(now));
    }

    #[test]
    fn test_layer_table_names() {
        assert_eq!(CacheLayer::Answer.table_name(), "answer_records");
        assert_eq!(CacheLayer::Compressed.table_name(), "compressed_records");
        assert_eq!(CacheLayer::Chunks.table_name(), "chunk_records");
    }

    #[test]
    fn test_lookup_result_hit_layer() {
        assert_eq!(LookupResult::Miss.hit_layer(), None);
        let hit = LookupResult::ChunksHit {
            chunk_ids: vec!["a".into()],
            chunk_scores: vec![0.5],
            similarity: 0.9,
        };
        assert!(hit.is_hit());
        assert_eq!(hit.hit_layer(), Some(CacheLayer::Chunks));
    }
}
