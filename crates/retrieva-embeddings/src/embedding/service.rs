//! Concrete implementation of the EmbeddingProvider
//!
//! This module provides the default embedding provider implementation
//! that uses the pooled `EmbeddingModel`.

use super::pool::EmbeddingModelPool;
use super::traits::EmbeddingProvider;
use crate::EmbeddingResult;
use async_trait::async_trait;
use retrieva_config::EmbeddingConfig;
use std::time::Duration;

/// Texts collected into one inference call per worker before it falls back
/// to whatever arrived within `batch_timeout_ms`.
const WORKER_BATCH_SIZE: usize = 32;

/// Default implementation of `EmbeddingProvider` using a model pool with
/// request batching, so concurrent callers share inference passes without
/// contending on a single model instance.
pub struct DefaultEmbeddingProvider {
    pool: EmbeddingModelPool,
    model_name: String,
    dimension: usize,
    max_tokens: usize,
}

impl DefaultEmbeddingProvider {
    /// Create a new embedding provider with the given configuration.
    ///
    /// Initializes a pool of embedding models for parallel inference.
    #[must_use]
    pub fn new(config: EmbeddingConfig) -> Self {
        let pool = EmbeddingModelPool::new(
            config.model.clone(),
            config.max_tokens,
            config.pool_size,
            WORKER_BATCH_SIZE,
            Duration::from_millis(config.batch_timeout_ms),
        );

        Self {
            pool,
            model_name: config.model,
            dimension: config.dimension,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for DefaultEmbeddingProvider {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let owned_texts: Vec<String> = texts.iter().map(|s| (*s).to_string()).collect();
        self.pool.embed(owned_texts).await
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn is_ready(&self) -> bool {
        // Pool is always ready - models load lazily on first use.
        true
    }

    async fn ensure_ready(&self) -> EmbeddingResult<()> {
        // Warm up the pool by submitting a test request, triggering lazy
        // loading in at least one worker.
        let _ = self.embed_batch(&["test"]).await?;
        Ok(())
    }
}

/// Mock implementation for testing
#[cfg(test)]
pub struct MockEmbeddingProvider {
    dimension: usize,
    fail: bool,
}

#[cfg(test)]
impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
        }
    }

    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[cfg(test)]
#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if self.fail {
            return Err(crate::EmbeddingError::Other("Mock embedding failure".into()));
        }
        Ok(texts.iter().map(|_| vec![0.1; self.dimension]).collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        8192
    }

    fn model_name(&self) -> &str {
        "mock-embedding-model"
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn ensure_ready(&self) -> EmbeddingResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_one_embedding_per_text() {
        let provider = MockEmbeddingProvider::new(768);
        let embeddings = provider.embed_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0].len(), 768);
    }

    #[tokio::test]
    async fn mock_provider_surfaces_configured_failure() {
        let provider = MockEmbeddingProvider::new(768).with_failure();
        assert!(provider.embed_batch(&["a"]).await.is_err());
    }
}
