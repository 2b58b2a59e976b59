#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]

//! # Ragcache Core
//!
//! Multi-tier semantic cache for Retrieval-Augmented Generation pipelines.
//!
//! For each incoming query the cache answers, in order: do I have a final
//! answer for a semantically equivalent query (L1)? A reusable compressed
//! context (L2)? A reusable set of retrieved chunk ids (L3)? Any hit
//! short-circuits the corresponding pipeline stages.
//!
//! ## Module Organization
//!
//! ### Primary APIs
//! - [`cache`]: The orchestrator ([`cache::SemanticCache`]) exposing the
//!   lookup/store/invalidate surface
//! - [`embeddings`]: Provider trait, gateway contract enforcement, cosine
//!   similarity
//! - [`store`]: Persistent store trait plus the in-memory implementation
//!
//! ### Support Modules
//! - [`types`]: Entries, scopes, layers, lookup results
//! - [`config`]: Immutable configuration record
//! - [`index`]: Per-layer vector index (linear or partitioned)
//! - [`capacity`]: Eviction ranking and planning
//! - [`safety`]: Sensitive-content rules
//! - [`sweeper`]: Background TTL sweep task
//! - [`stats`]: Lock-free counters and daily buckets
//! - [`version`]: Knowledge-base version provider seam
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ragcache_core::cache::SemanticCache;
//! use ragcache_core::config::CacheConfig;
//! use ragcache_core::embeddings::MockEmbedder;
//! use ragcache_core::store::MemoryStore;
//! use ragcache_core::sweeper::TtlSweeper;
//! use ragcache_core::types::{LookupResult, ScopeTag, StoreMetadata};
//! use ragcache_core::version::StaticVersionProvider;
//!
//! #[tokio::main]
//! async fn main() -> ragcache_core::Result<()> {
//!     let cache = Arc::new(
//!         SemanticCache::new(
//!             CacheConfig::new(384),
//!             Arc::new(MockEmbedder::new(384)),
//!             Arc::new(MemoryStore::new()),
//!             Arc::new(StaticVersionProvider::new("kb-2024-01")),
//!         )
//!         .await?,
//!     );
//!     let sweeper = TtlSweeper::start(Arc::clone(&cache));
//!
//!     let scope = ScopeTag::Global;
//!     if let LookupResult::Miss = cache.lookup("What is life?", &scope).await {
//!         // Run retrieval, compression, and generation, then write back:
//!         let meta = StoreMetadata::new("llm-backend", 1000, "kb-2024-01");
//!         cache.store_chunks("What is life?", &scope, vec!["c1".into()], vec![0.9], meta.clone()).await?;
//!         cache.store_answer("What is life?", &scope, "42", meta).await?;
//!     }
//!
//!     println!("hit rate: {:.1}%", cache.stats().hit_rate() * 100.0);
//!     sweeper.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod capacity;
pub mod config;
pub mod constants;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod retry;
pub mod safety;
pub mod stats;
pub mod store;
pub mod sweeper;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use cache::SemanticCache;
pub use capacity::CapacityPlanner;
pub use config::{CacheConfig, EvictionWeights, Isolation, SimilarityThresholds, SourceVersionMode};
pub use embeddings::{EmbeddingGateway, EmbeddingProvider, MockEmbedder};
pub use error::{Error, Result};
pub use index::VectorIndex;
pub use safety::{SensitiveRule, SensitiveRules};
pub use stats::{StatsRecorder, StatsSnapshot};
pub use store::{CacheStore, MemoryStore};
pub use sweeper::TtlSweeper;
pub use types::{
    derive_entry_id, AccessInfo, AnswerRecord, CacheEntry, CacheLayer, ChunkRecord,
    CompressedRecord, DailyStats, EntryHeader, HealthState, LookupResult, ScopeTag, StoreMetadata,
};
pub use version::{SourceVersionProvider, StaticVersionProvider};
