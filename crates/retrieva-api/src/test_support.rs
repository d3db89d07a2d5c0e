//! Stub collaborators for route-level tests: an in-memory backend and a
//! deterministic embedding provider, wired into a full [`AppState`].

#![cfg(test)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use retrieva_common::RetrievaError;
use retrieva_config::{QueryDefaults, RerankerConfig};
use retrieva_embeddings::{EmbeddingProvider, EmbeddingResult};
use retrieva_queue::JobQueue;
use retrieva_search::SearchPipeline;
use retrieva_storage::model::{Chunk, EmbeddingMetadata, Filter, SearchResult};
use retrieva_storage::{StorageBackend, StorageKind};

use crate::state::AppState;

pub struct StubEmbeddings {
    pub dimension: usize,
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddings {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.1_f32; self.dimension]).collect())
    }
    fn embedding_dimension(&self) -> usize {
        self.dimension
    }
    fn max_tokens(&self) -> usize {
        512
    }
    fn model_name(&self) -> &str {
        "stub"
    }
    async fn is_ready(&self) -> bool {
        true
    }
    async fn ensure_ready(&self) -> EmbeddingResult<()> {
        Ok(())
    }
}

pub struct StubBackend {
    chunks: Mutex<Vec<Chunk>>,
    initialized: AtomicBool,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self { chunks: Mutex::new(Vec::new()), initialized: AtomicBool::new(true) }
    }
}

#[async_trait]
impl StorageBackend for StubBackend {
    async fn initialize(&self) -> Result<(), RetrievaError> {
        Ok(())
    }

    async fn upsert(&self, records: &[Chunk]) -> Result<(), RetrievaError> {
        self.chunks.lock().expect("lock").extend_from_slice(records);
        Ok(())
    }

    async fn vector_search(
        &self,
        _embedding: &[f32],
        top_k: usize,
        _threshold: f32,
        _filter: &Filter,
    ) -> Result<Vec<SearchResult>, RetrievaError> {
        let chunks = self.chunks.lock().expect("lock");
        Ok(chunks
            .iter()
            .take(top_k)
            .map(|c| SearchResult {
                chunk_id: c.id,
                text: c.text.clone(),
                metadata: c.metadata.clone(),
                score: 0.9,
                signal_scores: retrieva_storage::model::SignalScores { vector: Some(0.9), ..Default::default() },
            })
            .collect())
    }

    async fn keyword_search(&self, _query: &str, top_k: usize, _filter: &Filter) -> Result<Vec<SearchResult>, RetrievaError> {
        let chunks = self.chunks.lock().expect("lock");
        Ok(chunks
            .iter()
            .take(top_k)
            .map(|c| SearchResult {
                chunk_id: c.id,
                text: c.text.clone(),
                metadata: c.metadata.clone(),
                score: 0.7,
                signal_scores: retrieva_storage::model::SignalScores { keyword: Some(0.7), ..Default::default() },
            })
            .collect())
    }

    async fn get_count(&self, _filter: &Filter) -> Result<usize, RetrievaError> {
        Ok(self.chunks.lock().expect("lock").len())
    }

    async fn get_by_id(&self, chunk_id: uuid::Uuid) -> Result<Option<Chunk>, RetrievaError> {
        Ok(self.chunks.lock().expect("lock").iter().find(|c| c.id == chunk_id).cloned())
    }

    async fn reset(&self) -> Result<(), RetrievaError> {
        self.chunks.lock().expect("lock").clear();
        Ok(())
    }

    async fn get_embedding_metadata(&self) -> Result<Option<EmbeddingMetadata>, RetrievaError> {
        Ok(Some(EmbeddingMetadata { provider: "local".to_string(), model: "stub".to_string(), dimension: 4 }))
    }

    async fn set_embedding_metadata(&self, _metadata: EmbeddingMetadata) -> Result<(), RetrievaError> {
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }
}

pub fn query_defaults() -> QueryDefaults {
    QueryDefaults { top_k: 10, threshold: 0.0, alpha: 0.5, rrf_k: 60 }
}

pub fn reranker_off() -> RerankerConfig {
    RerankerConfig { enabled: false, provider: None, model: None, candidate_multiplier: 10, latency_budget_ms: 200 }
}

/// Builds an [`AppState`] backed entirely by in-memory stubs, suitable for
/// exercising route handlers with `tower::ServiceExt::oneshot`.
///
/// Returns the backing [`tempfile::TempDir`] alongside the state; the
/// caller must keep it alive for as long as the state is used, since the
/// job queue persists to a file inside it.
pub fn app_state() -> (AppState, tempfile::TempDir) {
    let backend: Arc<dyn StorageBackend> = Arc::new(StubBackend::default());
    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbeddings { dimension: 4 });
    let search = Arc::new(SearchPipeline::new(
        Arc::clone(&backend),
        Arc::clone(&embeddings),
        None,
        None,
        query_defaults(),
        reranker_off(),
    ));
    let dir = tempfile::tempdir().expect("temp queue dir");
    let queue = Arc::new(JobQueue::load(dir.path().join("jobs.jsonl"), 100, 24).expect("queue load"));

    (AppState { backend, storage_kind: StorageKind::Embedded, embeddings, search, queue }, dir)
}
