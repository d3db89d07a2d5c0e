//! An in-memory `StorageBackend` double for tests that don't need real
//! LanceDB/Tantivy indices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use retrieva_common::RetrievaError;
use retrieva_storage::{Chunk, EmbeddingMetadata, Filter, SearchResult, StorageBackend};
use uuid::Uuid;

#[derive(Default)]
pub struct MockBackend {
    chunks: Mutex<Vec<Chunk>>,
    embedding_metadata: Mutex<Option<EmbeddingMetadata>>,
    initialized: AtomicBool,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    async fn initialize(&self) -> Result<(), RetrievaError> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert(&self, records: &[Chunk]) -> Result<(), RetrievaError> {
        let mut chunks = self.chunks.lock().expect("mock lock poisoned");
        for record in records {
            chunks.retain(|c| c.id != record.id);
            chunks.push(record.clone());
        }
        Ok(())
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
        filter: &Filter,
    ) -> Result<Vec<SearchResult>, RetrievaError> {
        let chunks = self.chunks.lock().expect("mock lock poisoned");
        let mut results: Vec<SearchResult> = chunks
            .iter()
            .filter(|c| filter.matches(&c.metadata))
            .map(|c| {
                let score = cosine_similarity(embedding, &c.embedding);
                SearchResult {
                    chunk_id: c.id,
                    text: c.text.clone(),
                    metadata: c.metadata.clone(),
                    score,
                    signal_scores: retrieva_storage::model::SignalScores {
                        vector: Some(score),
                        ..Default::default()
                    },
                }
            })
            .filter(|r| r.score >= threshold)
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        results.truncate(top_k);
        Ok(results)
    }

    async fn keyword_search(&self, query: &str, top_k: usize, filter: &Filter) -> Result<Vec<SearchResult>, RetrievaError> {
        let chunks = self.chunks.lock().expect("mock lock poisoned");
        let needle = query.to_lowercase();
        let mut results: Vec<SearchResult> = chunks
            .iter()
            .filter(|c| filter.matches(&c.metadata))
            .filter_map(|c| {
                let hits = c.text.to_lowercase().matches(&needle).count();
                if hits == 0 {
                    return None;
                }
                Some((c, hits))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|(c, hits)| (c, hits as f32))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|(c, hits)| {
                SearchResult {
                    chunk_id: c.id,
                    text: c.text.clone(),
                    metadata: c.metadata.clone(),
                    score: hits,
                    signal_scores: retrieva_storage::model::SignalScores {
                        keyword: Some(hits),
                        ..Default::default()
                    },
                }
            })
            .collect();
        let max_score = results.iter().map(|r| r.score).fold(0.0_f32, f32::max);
        if max_score > 0.0 {
            for result in &mut results {
                result.score /= max_score;
            }
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        results.truncate(top_k);
        Ok(results)
    }

    async fn get_count(&self, filter: &Filter) -> Result<usize, RetrievaError> {
        let chunks = self.chunks.lock().expect("mock lock poisoned");
        Ok(chunks.iter().filter(|c| filter.matches(&c.metadata)).count())
    }

    async fn get_by_id(&self, chunk_id: Uuid) -> Result<Option<Chunk>, RetrievaError> {
        let chunks = self.chunks.lock().expect("mock lock poisoned");
        Ok(chunks.iter().find(|c| c.id == chunk_id).cloned())
    }

    async fn reset(&self) -> Result<(), RetrievaError> {
        self.chunks.lock().expect("mock lock poisoned").clear();
        *self.embedding_metadata.lock().expect("mock lock poisoned") = None;
        Ok(())
    }

    async fn get_embedding_metadata(&self) -> Result<Option<EmbeddingMetadata>, RetrievaError> {
        Ok(self.embedding_metadata.lock().expect("mock lock poisoned").clone())
    }

    async fn set_embedding_metadata(&self, metadata: EmbeddingMetadata) -> Result<(), RetrievaError> {
        *self.embedding_metadata.lock().expect("mock lock poisoned") = Some(metadata);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieva_storage::model::{ChunkMetadata, SourceKind};

    fn chunk(id: Uuid, text: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            embedding,
            metadata: ChunkMetadata {
                source_path: "a.rs".to_string(),
                source_kind: SourceKind::Code,
                language: Some("rust".to_string()),
                symbol_name: None,
                symbol_kind: None,
                start_line: 1,
                end_line: 2,
                docstring: None,
            },
        }
    }

    #[tokio::test]
    async fn vector_search_ranks_by_cosine_similarity() {
        let backend = MockBackend::new();
        backend
            .upsert(&[
                chunk(Uuid::new_v4(), "a", vec![1.0, 0.0]),
                chunk(Uuid::new_v4(), "b", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = backend
            .vector_search(&[1.0, 0.0], 10, 0.0, &Filter::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "a");
    }

    #[tokio::test]
    async fn keyword_search_normalizes_by_max_score() {
        let backend = MockBackend::new();
        backend
            .upsert(&[
                chunk(Uuid::new_v4(), "rust rust rust", vec![1.0]),
                chunk(Uuid::new_v4(), "rust", vec![1.0]),
            ])
            .await
            .unwrap();

        let results = backend.keyword_search("rust", 10, &Filter::default()).await.unwrap();
        assert_eq!(results[0].score, 1.0);
        assert!(results[1].score < 1.0);
    }
}
