//! Trait abstractions for embedding generation
//!
//! This module provides trait abstractions for embedding providers,
//! enabling pluggable implementations and better testability.

use crate::EmbeddingResult;
use async_trait::async_trait;

/// Trait for embedding generation providers
///
/// This trait abstracts embedding generation operations, allowing different
/// providers (local models, API services) to be used interchangeably.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of texts
    ///
    /// Returns a vector of embeddings, one for each input text.
    /// The dimensionality depends on the model being used.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Get the dimensionality of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the maximum number of tokens this provider can handle
    fn max_tokens(&self) -> usize;

    /// Get the name/description of the embedding model
    fn model_name(&self) -> &str;

    /// Check if the model is ready for use
    async fn is_ready(&self) -> bool;

    /// Ensure the model is loaded and ready
    async fn ensure_ready(&self) -> EmbeddingResult<()>;
}
