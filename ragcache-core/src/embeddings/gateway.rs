//! Gateway enforcing the embedding contract.
//!
//! Every embedding the cache consumes flows through [`EmbeddingGateway`],
//! which pins the dimension at construction, bounds input size, applies a
//! per-call timeout, and guarantees unit L2 norm on output.

use super::provider::EmbeddingProvider;
use super::similarity::{l2_norm, normalize};
use crate::constants::NORM_TOLERANCE;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Embedding gateway wrapping a provider with contract enforcement
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    timeout: Duration,
    max_input_chars: usize,
}

impl EmbeddingGateway {
    /// Wrap a provider, verifying its dimension against the cache dimension.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` when the provider's dimension does
    /// not equal `dimension`; this fails cache initialization.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        dimension: usize,
        timeout: Duration,
        max_input_chars: usize,
    ) -> Result<Self> {
        if provider.dimension() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: provider.dimension(),
            });
        }
        Ok(Self {
            provider,
            dimension,
            timeout,
            max_input_chars,
        })
    }

    /// The fixed embedding dimension of this cache.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Model identifier of the wrapped provider.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed `text` into a unit vector of the cache dimension.
    ///
    /// # Errors
    ///
    /// - `Error::EmbedInputRejected` when the input exceeds the size bound
    /// - `Error::EmbedTimeout` when the provider misses its deadline
    /// - `Error::EmbedUnavailable` on provider failure or a zero vector
    /// - `Error::DimensionMismatch` when the provider returns the wrong width
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let char_count = text.chars().count();
        if char_count > self.max_input_chars {
            return Err(Error::EmbedInputRejected(format!(
                "input of {char_count} chars exceeds limit of {}",
                self.max_input_chars
            )));
        }

        let embedding = tokio::time::timeout(self.timeout, self.provider.embed(text))
            .await
            .map_err(|_| Error::EmbedTimeout(self.timeout))?
            .map_err(|e| Error::EmbedUnavailable(e.to_string()))?;

        if embedding.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let norm = l2_norm(&embedding);
        if norm == 0.0 || !norm.is_finite() {
            return Err(Error::EmbedUnavailable("provider returned a degenerate vector".into()));
        }
        if (norm - 1.0).abs() <= NORM_TOLERANCE {
            return Ok(embedding);
        }

        // Provider drifted outside tolerance; renormalize rather than store
        // a vector that breaks the unit-norm invariant.
        debug!(model = self.provider.model_name(), norm, "renormalizing off-unit embedding");
        Ok(normalize(embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;

    struct UnnormalizedProvider {
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for UnnormalizedProvider {
        async fn embed(&self, _text: &str) -> AnyResult<Vec<f32>> {
            Ok(vec![2.0; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "unnormalized"
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        async fn embed(&self, _text: &str) -> AnyResult<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    fn gateway(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> EmbeddingGateway {
        EmbeddingGateway::new(provider, dimension, Duration::from_millis(100), 100).unwrap()
    }

    #[test]
    fn test_dimension_mismatch_fails_construction() {
        let provider = Arc::new(MockEmbedder::new(64));
        let result = EmbeddingGateway::new(provider, 128, Duration::from_secs(1), 100);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 128, actual: 64 })
        ));
    }

    #[tokio::test]
    async fn test_oversize_input_rejected() {
        let gw = gateway(Arc::new(MockEmbedder::new(8)), 8);
        let long_input = "x".repeat(101);
        assert!(matches!(
            gw.embed(&long_input).await,
            Err(Error::EmbedInputRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_renormalizes_off_unit_output() {
        let gw = gateway(Arc::new(UnnormalizedProvider { dimension: 4 }), 4);
        let v = gw.embed("hello").await.unwrap();
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_as_embed_timeout() {
        let gw = gateway(Arc::new(SlowProvider), 2);
        let result = gw.embed("hello").await;
        assert!(matches!(result, Err(Error::EmbedTimeout(_))));
    }

    #[tokio::test]
    async fn test_passthrough_for_unit_vectors() {
        let gw = gateway(Arc::new(MockEmbedder::new(16)), 16);
        let v = gw.embed("hello").await.unwrap();
        assert_eq!(v.len(), 16);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }
}
