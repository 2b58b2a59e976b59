//! Mock embedding provider for testing
//!
//! Produces deterministic but non-semantic unit vectors. Intended for tests
//! and local development; in production a real model-backed provider should
//! be used instead.

use super::provider::EmbeddingProvider;
use super::similarity::normalize;
use anyhow::Result;
use async_trait::async_trait;

/// Deterministic hash-seeded embedding provider
///
/// Identical input always produces the identical L2-normalized vector, so
/// exact-replay lookups score similarity 1.0 against their stored entry.
pub struct MockEmbedder {
    name: String,
    dimension: usize,
}

impl MockEmbedder {
    /// Create a mock embedder with the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            name: "mock-embedder".to_string(),
            dimension,
        }
    }

    /// Generate a deterministic embedding for `text`.
    #[must_use]
    pub fn generate(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);
        let mut seed = hash;

        for _ in 0..self.dimension {
            // Simple LCG to expand the hash into a full vector
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let value = ((seed >> 16) as f32) / 32768.0 - 1.0; // Range [-1, 1]
            embedding.push(value);
        }

        normalize(embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }
}
