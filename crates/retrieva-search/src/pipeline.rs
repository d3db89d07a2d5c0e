//! The Retrieval Pipeline: `query(text, mode, parameters)` over whichever
//! `StorageBackend` the Backend Factory handed out, fusing signals with
//! Reciprocal Rank Fusion and optionally reranking.

use std::sync::Arc;
use std::time::Duration;

use retrieva_common::RetrievaError;
use retrieva_config::{QueryDefaults, RerankerConfig};
use retrieva_embeddings::EmbeddingProvider;
use retrieva_storage::model::SearchResult;
use retrieva_storage::StorageBackend;

use crate::graph::GraphStore;
use crate::query::{QueryMode, QueryParams, QueryResponse, ResolvedParams};
use crate::rerank::Reranker;
use crate::rrf::{reciprocal_rank_fusion, SignalRanking};

const MAX_CANDIDATE_K: usize = 100;

pub struct SearchPipeline {
    backend: Arc<dyn StorageBackend>,
    embeddings: Arc<dyn EmbeddingProvider>,
    graph_store: Option<Arc<dyn GraphStore>>,
    reranker: Option<Arc<dyn Reranker>>,
    defaults: QueryDefaults,
    reranker_config: RerankerConfig,
}

impl SearchPipeline {
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        embeddings: Arc<dyn EmbeddingProvider>,
        graph_store: Option<Arc<dyn GraphStore>>,
        reranker: Option<Arc<dyn Reranker>>,
        defaults: QueryDefaults,
        reranker_config: RerankerConfig,
    ) -> Self {
        Self {
            backend,
            embeddings,
            graph_store,
            reranker,
            defaults,
            reranker_config,
        }
    }

    fn resolve(&self, params: QueryParams) -> ResolvedParams {
        let top_k = params.top_k.unwrap_or(self.defaults.top_k).max(1);
        let candidate_k = if self.reranker_config.enabled {
            (top_k * self.reranker_config.candidate_multiplier as usize).min(MAX_CANDIDATE_K)
        } else {
            top_k
        };
        ResolvedParams {
            top_k,
            candidate_k: candidate_k.max(top_k),
            similarity_threshold: params.similarity_threshold.unwrap_or(self.defaults.threshold),
            rrf_k: params.rrf_k.unwrap_or(self.defaults.rrf_k),
            alpha: params.alpha.unwrap_or(self.defaults.alpha),
            filter: params.filter,
            traversal_depth: params.traversal_depth.unwrap_or(1),
        }
    }

    /// # Errors
    /// `RetrievalError` if every signal in the requested mode fails, or
    /// `InvalidInput` for a malformed query.
    pub async fn query(&self, text: &str, mode: QueryMode, params: QueryParams) -> Result<QueryResponse, RetrievaError> {
        if text.trim().is_empty() {
            return Err(RetrievaError::invalid_input("query text must not be empty"));
        }
        let resolved = self.resolve(params);
        let mut warnings = Vec::new();

        let fused = match mode {
            QueryMode::Vector => {
                let vector = self.vector_signal(text, &resolved).await?;
                reciprocal_rank_fusion(&[SignalRanking { weight: 1.0, results: &vector }], resolved.rrf_k)
            }
            QueryMode::Keyword => {
                let keyword = self.keyword_signal(text, &resolved).await?;
                reciprocal_rank_fusion(&[SignalRanking { weight: 1.0, results: &keyword }], resolved.rrf_k)
            }
            QueryMode::Hybrid => self.hybrid(text, &resolved, &mut warnings).await?,
            QueryMode::Graph => {
                let graph = self.graph_signal(text, &resolved, &mut warnings).await?;
                reciprocal_rank_fusion(&[SignalRanking { weight: 1.0, results: &graph }], resolved.rrf_k)
            }
            QueryMode::Multi => self.multi(text, &resolved, &mut warnings).await?,
        };

        let mut candidates = fused;
        candidates.truncate(resolved.candidate_k);

        let mut results = if self.reranker_config.enabled {
            self.rerank(text, candidates, &mut warnings).await
        } else {
            candidates
        };

        results.retain(|r| r.score >= resolved.similarity_threshold);
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        results.truncate(resolved.top_k);

        Ok(QueryResponse { results, warnings })
    }

    async fn vector_signal(&self, text: &str, resolved: &ResolvedParams) -> Result<Vec<SearchResult>, RetrievaError> {
        let mut embeddings = self
            .embeddings
            .embed_batch(&[text])
            .await
            .map_err(|e| RetrievaError::retrieval(format!("embedding query failed: {e}")))?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| RetrievaError::retrieval("embedding provider returned no vector for the query"))?;
        self.backend
            .vector_search(&embedding, resolved.candidate_k, resolved.similarity_threshold, &resolved.filter)
            .await
    }

    async fn keyword_signal(&self, text: &str, resolved: &ResolvedParams) -> Result<Vec<SearchResult>, RetrievaError> {
        self.backend.keyword_search(text, resolved.candidate_k, &resolved.filter).await
    }

    async fn graph_signal(
        &self,
        text: &str,
        resolved: &ResolvedParams,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<SearchResult>, RetrievaError> {
        let Some(graph_store) = &self.graph_store else {
            warnings.push("graph signal unavailable: no graph store configured".to_string());
            return Ok(Vec::new());
        };
        match graph_store.traverse(&[text.to_string()], resolved.traversal_depth).await {
            Ok(hits) => Ok(hits
                .into_iter()
                .take(resolved.candidate_k)
                .map(|hit| SearchResult {
                    chunk_id: hit.chunk_id,
                    text: hit.text,
                    metadata: hit.metadata,
                    score: hit.score,
                    signal_scores: retrieva_storage::model::SignalScores {
                        graph: Some(hit.score),
                        ..Default::default()
                    },
                })
                .collect()),
            Err(err) => {
                warnings.push(format!("graph signal failed: {err}"));
                Ok(Vec::new())
            }
        }
    }

    async fn hybrid(
        &self,
        text: &str,
        resolved: &ResolvedParams,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<SearchResult>, RetrievaError> {
        let (vector, keyword) = tokio::join!(self.vector_signal(text, resolved), self.keyword_signal(text, resolved));

        let vector = ok_or_warn(vector, "vector", warnings);
        let keyword = ok_or_warn(keyword, "keyword", warnings);

        if vector.is_none() && keyword.is_none() {
            return Err(RetrievaError::retrieval("both vector and keyword signals failed"));
        }

        let vector = vector.unwrap_or_default();
        let keyword = keyword.unwrap_or_default();
        Ok(reciprocal_rank_fusion(
            &[
                SignalRanking { weight: resolved.alpha, results: &vector },
                SignalRanking { weight: 1.0 - resolved.alpha, results: &keyword },
            ],
            resolved.rrf_k,
        ))
    }

    async fn multi(
        &self,
        text: &str,
        resolved: &ResolvedParams,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<SearchResult>, RetrievaError> {
        let (vector, keyword) = tokio::join!(self.vector_signal(text, resolved), self.keyword_signal(text, resolved));
        let graph = self.graph_signal(text, resolved, warnings).await?;

        let vector = ok_or_warn(vector, "vector", warnings);
        let keyword = ok_or_warn(keyword, "keyword", warnings);

        if vector.is_none() && keyword.is_none() && graph.is_empty() {
            return Err(RetrievaError::retrieval("every signal failed in multi mode"));
        }

        let vector = vector.unwrap_or_default();
        let keyword = keyword.unwrap_or_default();
        Ok(reciprocal_rank_fusion(
            &[
                SignalRanking { weight: 1.0, results: &vector },
                SignalRanking { weight: 1.0, results: &keyword },
                SignalRanking { weight: 1.0, results: &graph },
            ],
            resolved.rrf_k,
        ))
    }

    async fn rerank(&self, text: &str, candidates: Vec<SearchResult>, warnings: &mut Vec<String>) -> Vec<SearchResult> {
        let Some(reranker) = &self.reranker else {
            return candidates;
        };
        if candidates.is_empty() {
            return candidates;
        }

        let pairs: Vec<(uuid::Uuid, String)> = candidates.iter().map(|c| (c.chunk_id, c.text.clone())).collect();
        let budget = Duration::from_millis(self.reranker_config.latency_budget_ms);

        match tokio::time::timeout(budget, reranker.rerank(text, &pairs)).await {
            Ok(Ok(scores)) => {
                let mut by_id: std::collections::HashMap<uuid::Uuid, f32> =
                    scores.into_iter().map(|c| (c.chunk_id, c.score)).collect();
                candidates
                    .into_iter()
                    .map(|mut result| {
                        if let Some(score) = by_id.remove(&result.chunk_id) {
                            result.signal_scores.rerank = Some(score);
                            result.score = score;
                        }
                        result
                    })
                    .collect()
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "reranker_degraded");
                warnings.push("reranker_degraded".to_string());
                candidates
            }
            Err(_elapsed) => {
                tracing::warn!(budget_ms = self.reranker_config.latency_budget_ms, "reranker_degraded");
                warnings.push("reranker_degraded".to_string());
                candidates
            }
        }
    }
}

fn ok_or_warn(
    result: Result<Vec<SearchResult>, RetrievaError>,
    signal: &str,
    warnings: &mut Vec<String>,
) -> Option<Vec<SearchResult>> {
    match result {
        Ok(results) => Some(results),
        Err(err) => {
            warnings.push(format!("{signal} signal failed: {err}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use retrieva_config::{QueryDefaults, RerankerConfig};
    use retrieva_storage::model::{Chunk, ChunkMetadata, EmbeddingMetadata, Filter, SourceKind};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct StubEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddings {
        async fn embed_batch(&self, texts: &[&str]) -> retrieva_embeddings::EmbeddingResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1_f32; 4]).collect())
        }
        fn embedding_dimension(&self) -> usize {
            4
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
        async fn ensure_ready(&self) -> retrieva_embeddings::EmbeddingResult<()> {
            Ok(())
        }
    }

    fn chunk(id: uuid::Uuid, text: &str) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            metadata: ChunkMetadata {
                source_path: "a.rs".to_string(),
                source_kind: SourceKind::Code,
                language: None,
                symbol_name: None,
                symbol_kind: None,
                start_line: 1,
                end_line: 1,
                docstring: None,
            },
            embedding: vec![0.1; 4],
        }
    }

    struct StubBackend {
        chunks: Mutex<Vec<Chunk>>,
        fail_vector: bool,
        fail_keyword: bool,
        initialized: AtomicBool,
    }

    impl StubBackend {
        fn new(chunks: Vec<Chunk>) -> Self {
            Self { chunks: Mutex::new(chunks), fail_vector: false, fail_keyword: false, initialized: AtomicBool::new(true) }
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
            if self.fail_vector {
                return Err(RetrievaError::backend_unavailable("vector store down"));
            }
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
            if self.fail_keyword {
                return Err(RetrievaError::backend_unavailable("keyword index down"));
            }
            let chunks = self.chunks.lock().expect("lock");
            Ok(chunks
                .iter()
                .rev()
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
            Ok(None)
        }

        async fn set_embedding_metadata(&self, _metadata: EmbeddingMetadata) -> Result<(), RetrievaError> {
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::Relaxed)
        }
    }

    fn defaults() -> QueryDefaults {
        QueryDefaults { top_k: 10, threshold: 0.0, alpha: 0.5, rrf_k: 60 }
    }

    fn reranker_off() -> RerankerConfig {
        RerankerConfig { enabled: false, provider: None, model: None, candidate_multiplier: 10, latency_budget_ms: 200 }
    }

    #[tokio::test]
    async fn vector_mode_returns_backend_hits() {
        let id = uuid::Uuid::new_v4();
        let backend = Arc::new(StubBackend::new(vec![chunk(id, "fn foo() {}")]));
        let pipeline = SearchPipeline::new(backend, Arc::new(StubEmbeddings), None, None, defaults(), reranker_off());

        let response = pipeline.query("foo", QueryMode::Vector, QueryParams::default()).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].chunk_id, id);
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn hybrid_mode_fuses_both_signals() {
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let backend = Arc::new(StubBackend::new(vec![chunk(a, "fn foo() {}"), chunk(b, "fn bar() {}")]));
        let pipeline = SearchPipeline::new(backend, Arc::new(StubEmbeddings), None, None, defaults(), reranker_off());

        let response = pipeline.query("foo bar", QueryMode::Hybrid, QueryParams::default()).await.unwrap();
        assert_eq!(response.results.len(), 2);
    }

    #[tokio::test]
    async fn hybrid_mode_degrades_when_one_signal_fails() {
        let a = uuid::Uuid::new_v4();
        let backend = Arc::new(StubBackend { fail_keyword: true, ..StubBackend::new(vec![chunk(a, "fn foo() {}")]) });
        let pipeline = SearchPipeline::new(backend, Arc::new(StubEmbeddings), None, None, defaults(), reranker_off());

        let response = pipeline.query("foo", QueryMode::Hybrid, QueryParams::default()).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert!(response.warnings.iter().any(|w| w.contains("keyword signal failed")));
    }

    #[tokio::test]
    async fn hybrid_mode_fails_when_every_signal_fails() {
        let backend = Arc::new(StubBackend { fail_vector: true, fail_keyword: true, ..StubBackend::new(vec![]) });
        let pipeline = SearchPipeline::new(backend, Arc::new(StubEmbeddings), None, None, defaults(), reranker_off());

        let result = pipeline.query("foo", QueryMode::Hybrid, QueryParams::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_query_text_is_rejected() {
        let backend = Arc::new(StubBackend::new(vec![]));
        let pipeline = SearchPipeline::new(backend, Arc::new(StubEmbeddings), None, None, defaults(), reranker_off());

        let result = pipeline.query("   ", QueryMode::Vector, QueryParams::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn graph_mode_without_graph_store_warns_and_returns_empty() {
        let backend = Arc::new(StubBackend::new(vec![]));
        let pipeline = SearchPipeline::new(backend, Arc::new(StubEmbeddings), None, None, defaults(), reranker_off());

        let response = pipeline.query("foo", QueryMode::Graph, QueryParams::default()).await.unwrap();
        assert!(response.results.is_empty());
        assert!(response.warnings.iter().any(|w| w.contains("graph store")));
    }
}
