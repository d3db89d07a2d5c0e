//! The Storage Protocol: the single async interface every backend implements.

use async_trait::async_trait;
use retrieva_common::RetrievaError;
use uuid::Uuid;

use crate::model::{Chunk, EmbeddingMetadata, Filter, SearchResult};

/// Every operation a retrieval backend must provide.
///
/// Implementations translate backend-native errors into [`RetrievaError`]
/// at the point where they have the context to classify them; callers
/// never see a backend-specific error type. Object-safe so the Backend
/// Factory can hand out `Arc<dyn StorageBackend>`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Idempotent: creates schema / loads indexes, then validates stored
    /// [`EmbeddingMetadata`] against the configured provider's dimension.
    ///
    /// # Errors
    /// `ConfigurationError` on a dimension mismatch or backend-level setup
    /// failure; fatal, never retried.
    async fn initialize(&self) -> Result<(), RetrievaError>;

    /// Insert-if-absent, update-if-present by `chunk.id`. On the first
    /// successful upsert to an empty store, writes [`EmbeddingMetadata`].
    ///
    /// # Errors
    /// `ConfigurationError` if an embedding's dimension disagrees with the
    /// store's recorded dimension; `BackendUnavailable` on I/O failure.
    async fn upsert(&self, records: &[Chunk]) -> Result<(), RetrievaError>;

    /// Up to `top_k` results ordered by similarity, excluding anything
    /// below `threshold`.
    ///
    /// # Errors
    /// `BackendUnavailable` on I/O failure, `InvalidInput` on a malformed
    /// filter.
    async fn vector_search(
        &self,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
        filter: &Filter,
    ) -> Result<Vec<SearchResult>, RetrievaError>;

    /// Up to `top_k` results ranked by a backend-native keyword relevance
    /// function, with scores normalized into `[0, 1]` by division against
    /// the maximum score observed in this result set.
    ///
    /// # Errors
    /// `BackendUnavailable` on I/O failure, `InvalidInput` on a malformed
    /// filter.
    async fn keyword_search(
        &self,
        query: &str,
        top_k: usize,
        filter: &Filter,
    ) -> Result<Vec<SearchResult>, RetrievaError>;

    /// Count of chunks matching `filter`.
    ///
    /// # Errors
    /// `BackendUnavailable` on I/O failure.
    async fn get_count(&self, filter: &Filter) -> Result<usize, RetrievaError>;

    /// A single record by id, or `None` if absent.
    ///
    /// # Errors
    /// `BackendUnavailable` on I/O failure.
    async fn get_by_id(&self, chunk_id: Uuid) -> Result<Option<Chunk>, RetrievaError>;

    /// Empties all chunks and [`EmbeddingMetadata`]; schema is preserved.
    ///
    /// # Errors
    /// `BackendUnavailable` on I/O failure.
    async fn reset(&self) -> Result<(), RetrievaError>;

    /// # Errors
    /// `BackendUnavailable` on I/O failure.
    async fn get_embedding_metadata(&self) -> Result<Option<EmbeddingMetadata>, RetrievaError>;

    /// # Errors
    /// `BackendUnavailable` on I/O failure.
    async fn set_embedding_metadata(
        &self,
        metadata: EmbeddingMetadata,
    ) -> Result<(), RetrievaError>;

    /// Observable without I/O once `initialize()` has succeeded.
    fn is_initialized(&self) -> bool;
}
