//! Embedding provider trait

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding providers that convert text to vectors
///
/// Providers are expected to be deterministic for identical input and to
/// return L2-normalized vectors; the [`EmbeddingGateway`](super::EmbeddingGateway)
/// verifies both and rejects providers whose dimension does not match the
/// cache configuration.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    ///
    /// # Arguments
    /// * `text` - Input text to embed
    ///
    /// # Returns
    /// Vector representation of the text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension for this provider
    fn dimension(&self) -> usize;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Check if the provider is available/configured
    async fn is_available(&self) -> bool {
        // Default implementation tries to embed a simple test
        self.embed("test").await.is_ok()
    }
}
