//! Shared fixtures for the end-to-end tests: a libSQL-backed cache with a
//! deterministic embedder and a switchable version provider.

#![allow(dead_code)]

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use ragcache_core::cache::SemanticCache;
use ragcache_core::config::CacheConfig;
use ragcache_core::embeddings::normalize;
use ragcache_core::embeddings::{EmbeddingProvider, MockEmbedder};
use ragcache_core::store::CacheStore;
use ragcache_core::types::{ScopeTag, StoreMetadata};
use ragcache_core::version::{SourceVersionProvider, StaticVersionProvider};
use ragcache_storage_libsql::LibsqlStore;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

pub const DIM: usize = 32;

/// Embedder with pinned vectors for specific texts, deterministic mock
/// vectors otherwise. Lets scenarios dial in exact similarities.
pub struct FixtureEmbedder {
    pinned: HashMap<String, Vec<f32>>,
    fallback: MockEmbedder,
}

impl FixtureEmbedder {
    pub fn new() -> Self {
        Self {
            pinned: HashMap::new(),
            fallback: MockEmbedder::new(DIM),
        }
    }

    pub fn pin(mut self, text: &str, mut vector: Vec<f32>) -> Self {
        vector.resize(DIM, 0.0);
        self.pinned.insert(text.to_string(), normalize(vector));
        self
    }
}

impl Default for FixtureEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for FixtureEmbedder {
    async fn embed(&self, text: &str) -> AnyResult<Vec<f32>> {
        Ok(self
            .pinned
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.generate(text)))
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "fixture-embedder"
    }
}

/// A fully wired cache over a temp-file libSQL database.
pub struct Harness {
    pub cache: Arc<SemanticCache>,
    pub store: Arc<LibsqlStore>,
    pub versions: Arc<StaticVersionProvider>,
    /// Keeps the database file alive for the test's duration.
    pub tempdir: TempDir,
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl Harness {
    pub async fn new(config: CacheConfig) -> Self {
        Self::with_provider(config, Arc::new(MockEmbedder::new(DIM))).await
    }

    pub async fn with_provider(config: CacheConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        init_tracing();
        let tempdir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(
            LibsqlStore::open(tempdir.path().join("cache.db"))
                .await
                .expect("open store"),
        );
        let versions = Arc::new(StaticVersionProvider::new("v1"));

        let cache = Arc::new(
            SemanticCache::new(
                config,
                provider,
                Arc::clone(&store) as Arc<dyn CacheStore>,
                Arc::clone(&versions) as Arc<dyn SourceVersionProvider>,
            )
            .await
            .expect("cache init"),
        );

        Self {
            cache,
            store,
            versions,
            tempdir,
        }
    }
}

pub fn metadata(tokens: u64, version: &str) -> StoreMetadata {
    StoreMetadata::new("test-llm", tokens, version)
}

/// Store chunks, compressed context, and answer for one query, the way the
/// pipeline feeds the cache back after a full miss.
pub async fn seed_pipeline_result(harness: &Harness, query: &str, scope: &ScopeTag, version: &str) {
    harness
        .cache
        .store_chunks(
            query,
            scope,
            vec!["a".into(), "b".into()],
            vec![0.9, 0.8],
            metadata(0, version),
        )
        .await
        .expect("store chunks");
    harness
        .cache
        .store_compressed(
            query,
            scope,
            "CTX",
            vec!["a".into(), "b".into()],
            metadata(0, version),
        )
        .await
        .expect("store compressed");
    harness
        .cache
        .store_answer(query, scope, "42", metadata(1000, version))
        .await
        .expect("store answer");
}
