//! Backend Factory: caches the process-wide active backend handle.
//!
//! Concrete backend construction (matching `storage.backend` to the
//! embedded or relational implementation) lives at the composition root
//! (`retrieva-api::bootstrap`), which is the only place that depends on
//! both backend crates. This module owns only the cache-and-invalidate
//! behavior so neither backend crate needs to depend on the other.

use std::future::Future;
use std::sync::Arc;

use retrieva_common::RetrievaError;
use tokio::sync::{OnceCell, RwLock};

use crate::protocol::StorageBackend;

/// Caches a constructed `Arc<dyn StorageBackend>`, built at most once per
/// process unless explicitly reset.
///
/// The factory never performs I/O itself beyond what the supplied
/// constructor does inside `initialize()`; it is purely a cache with an
/// invalidation hook.
pub struct BackendFactory {
    cell: RwLock<OnceCell<Arc<dyn StorageBackend>>>,
}

impl BackendFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: RwLock::new(OnceCell::new()),
        }
    }

    /// Return the cached backend, constructing it via `ctor` on first call.
    ///
    /// # Errors
    /// Propagates whatever `ctor` returns, typically `ConfigurationError`
    /// for an unknown backend selection or a dimension mismatch detected
    /// during `initialize()`.
    pub async fn get_or_init<F, Fut>(
        &self,
        ctor: F,
    ) -> Result<Arc<dyn StorageBackend>, RetrievaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn StorageBackend>, RetrievaError>>,
    {
        let guard = self.cell.read().await;
        if let Some(backend) = guard.get() {
            return Ok(Arc::clone(backend));
        }
        drop(guard);

        let guard = self.cell.write().await;
        // Another writer may have initialized it while we waited for the lock.
        if let Some(backend) = guard.get() {
            return Ok(Arc::clone(backend));
        }
        let backend = ctor().await?;
        guard
            .set(Arc::clone(&backend))
            .map_err(|_| RetrievaError::configuration("backend already initialized"))?;
        Ok(backend)
    }

    /// Invalidate the cache so the next `get_or_init` call reconstructs the
    /// backend from scratch.
    pub async fn reset(&self) {
        let mut guard = self.cell.write().await;
        *guard = OnceCell::new();
    }
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chunk, EmbeddingMetadata, Filter, SearchResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct NoopBackend;

    #[async_trait]
    impl StorageBackend for NoopBackend {
        async fn initialize(&self) -> Result<(), RetrievaError> {
            Ok(())
        }
        async fn upsert(&self, _records: &[Chunk]) -> Result<(), RetrievaError> {
            Ok(())
        }
        async fn vector_search(
            &self,
            _embedding: &[f32],
            _top_k: usize,
            _threshold: f32,
            _filter: &Filter,
        ) -> Result<Vec<SearchResult>, RetrievaError> {
            Ok(vec![])
        }
        async fn keyword_search(
            &self,
            _query: &str,
            _top_k: usize,
            _filter: &Filter,
        ) -> Result<Vec<SearchResult>, RetrievaError> {
            Ok(vec![])
        }
        async fn get_count(&self, _filter: &Filter) -> Result<usize, RetrievaError> {
            Ok(0)
        }
        async fn get_by_id(&self, _chunk_id: Uuid) -> Result<Option<Chunk>, RetrievaError> {
            Ok(None)
        }
        async fn reset(&self) -> Result<(), RetrievaError> {
            Ok(())
        }
        async fn get_embedding_metadata(
            &self,
        ) -> Result<Option<EmbeddingMetadata>, RetrievaError> {
            Ok(None)
        }
        async fn set_embedding_metadata(
            &self,
            _metadata: EmbeddingMetadata,
        ) -> Result<(), RetrievaError> {
            Ok(())
        }
        fn is_initialized(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn constructs_exactly_once_until_reset() {
        let factory = BackendFactory::new();
        let calls = AtomicUsize::new(0);

        let build = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RetrievaError>(Arc::new(NoopBackend) as Arc<dyn StorageBackend>)
        };

        factory.get_or_init(build).await.unwrap();
        factory.get_or_init(build).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        factory.reset().await;
        factory.get_or_init(build).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
