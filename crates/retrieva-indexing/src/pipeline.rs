//! The Indexing Pipeline: walks a folder, chunks each file with the
//! chunker appropriate to its kind, embeds chunks in batches, and upserts
//! them into the active storage backend.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use retrieva_common::RetrievaError;
use retrieva_config::IndexingConfig;
use retrieva_embeddings::EmbeddingProvider;
use retrieva_parsing::{get_language_config, get_language_from_extension, CodeChunker, DocumentChunker, TiktokenCounter, TokenCounter};
use retrieva_queue::model::{Job, JobProgress};
use retrieva_queue::worker::{IndexingDriver, JobOutcome, ProgressSink};
use retrieva_storage::model::{Chunk, ChunkMetadata, SourceKind};
use retrieva_storage::{stable_chunk_id, StorageBackend};

use crate::walker::enumerate_files;

/// A chunk pending embedding: its storage-ready metadata plus the text
/// that still needs to be turned into a vector.
struct PendingChunk {
    text: String,
    metadata: ChunkMetadata,
    source_path: String,
    ordinal: usize,
}

/// Walks, chunks, embeds, and upserts. Implements [`IndexingDriver`] so it
/// plugs directly into the job queue's worker.
pub struct IndexingPipeline {
    backend: Arc<dyn StorageBackend>,
    embeddings: Arc<dyn EmbeddingProvider>,
    code_chunker: CodeChunker,
    token_counter: TiktokenCounter,
    config: IndexingConfig,
}

impl IndexingPipeline {
    /// # Panics
    /// Never in practice: `TiktokenCounter::new` only fails for an
    /// encoder tiktoken doesn't ship, and every model name falls back to
    /// `cl100k_base`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, embeddings: Arc<dyn EmbeddingProvider>, config: IndexingConfig) -> Self {
        let token_counter = TiktokenCounter::new(embeddings.model_name(), embeddings.max_tokens())
            .unwrap_or_else(|_| TiktokenCounter::gpt4().expect("cl100k_base always loads"));

        Self {
            backend,
            embeddings,
            code_chunker: CodeChunker::new(),
            token_counter,
            config,
        }
    }

    /// Chunks one file's content according to its kind, returning pending
    /// chunks still missing their embeddings.
    fn chunk_file(
        &self,
        relative_path: &str,
        content: &str,
        max_chunk_tokens: usize,
        overlap_tokens: usize,
        include_code: bool,
    ) -> Vec<PendingChunk> {
        let extension = Path::new(relative_path).extension().and_then(|e| e.to_str());
        let language = extension.and_then(get_language_from_extension);
        let is_code = language.is_some_and(|lang| get_language_config(lang).is_some_and(|cfg| cfg.tree_sitter_language.is_some()));

        if is_code {
            if !include_code {
                return Vec::new();
            }
            let language = language.expect("is_code implies a recognized language");
            return self.chunk_code(relative_path, content, language, max_chunk_tokens, overlap_tokens);
        }

        self.chunk_documentation(relative_path, content, max_chunk_tokens, overlap_tokens)
    }

    fn chunk_code(
        &self,
        relative_path: &str,
        content: &str,
        language: &str,
        max_chunk_tokens: usize,
        overlap_tokens: usize,
    ) -> Vec<PendingChunk> {
        let declarations = match self.code_chunker.chunk(content, language) {
            Ok(declarations) => declarations,
            Err(err) => {
                tracing::warn!(file = relative_path, error = %err, "falling back to documentation chunking for unparsable code file");
                return self.chunk_documentation(relative_path, content, max_chunk_tokens, overlap_tokens);
            }
        };

        let mut pending = Vec::new();
        for declaration in declarations {
            if self.config.split_large_units && self.token_counter.count(&declaration.text) > max_chunk_tokens {
                let doc_chunker = DocumentChunker::new(&self.token_counter);
                let spans = doc_chunker.chunk(&declaration.text, max_chunk_tokens, overlap_tokens);
                for (index, span) in spans.into_iter().enumerate() {
                    pending.push(PendingChunk {
                        text: span.text,
                        source_path: relative_path.to_string(),
                        ordinal: pending.len(),
                        metadata: ChunkMetadata {
                            source_path: relative_path.to_string(),
                            source_kind: SourceKind::Code,
                            language: Some(language.to_string()),
                            symbol_name: if index == 0 { declaration.symbol_name.clone() } else { None },
                            symbol_kind: declaration.symbol_kind.clone(),
                            start_line: declaration.start_line.saturating_add(span.start_line).saturating_sub(1),
                            end_line: declaration.start_line.saturating_add(span.end_line).saturating_sub(1),
                            docstring: if index == 0 { declaration.docstring.clone() } else { None },
                        },
                    });
                }
            } else {
                pending.push(PendingChunk {
                    text: declaration.text,
                    source_path: relative_path.to_string(),
                    ordinal: pending.len(),
                    metadata: ChunkMetadata {
                        source_path: relative_path.to_string(),
                        source_kind: SourceKind::Code,
                        language: Some(language.to_string()),
                        symbol_name: declaration.symbol_name,
                        symbol_kind: declaration.symbol_kind,
                        start_line: declaration.start_line,
                        end_line: declaration.end_line,
                        docstring: declaration.docstring,
                    },
                });
            }
        }
        pending
    }

    fn chunk_documentation(&self, relative_path: &str, content: &str, max_chunk_tokens: usize, overlap_tokens: usize) -> Vec<PendingChunk> {
        let doc_chunker = DocumentChunker::new(&self.token_counter);
        doc_chunker
            .chunk(content, max_chunk_tokens, overlap_tokens)
            .into_iter()
            .enumerate()
            .map(|(ordinal, span)| PendingChunk {
                text: span.text,
                source_path: relative_path.to_string(),
                ordinal,
                metadata: ChunkMetadata {
                    source_path: relative_path.to_string(),
                    source_kind: SourceKind::Documentation,
                    language: None,
                    symbol_name: None,
                    symbol_kind: None,
                    start_line: span.start_line,
                    end_line: span.end_line,
                    docstring: None,
                },
            })
            .collect()
    }

    async fn embed_and_upsert(&self, pending: Vec<PendingChunk>) -> Result<u64, RetrievaError> {
        if pending.is_empty() {
            return Ok(0);
        }
        let texts: Vec<&str> = pending.iter().map(|p| p.text.as_str()).collect();
        let embeddings = self
            .embeddings
            .embed_batch(&texts)
            .await
            .map_err(|e| RetrievaError::indexing(format!("embedding batch failed: {e}")))?;

        if embeddings.len() != pending.len() {
            return Err(RetrievaError::indexing("embedding provider returned a mismatched batch size"));
        }

        let chunks: Vec<Chunk> = pending
            .into_iter()
            .zip(embeddings)
            .map(|(p, embedding)| Chunk {
                id: stable_chunk_id(&p.source_path, p.ordinal, &p.text),
                text: p.text,
                embedding,
                metadata: p.metadata,
            })
            .collect();

        let count = u64::try_from(chunks.len()).unwrap_or(u64::MAX);
        self.backend.upsert(&chunks).await?;
        Ok(count)
    }
}

#[async_trait]
impl IndexingDriver for IndexingPipeline {
    async fn run(&self, job: &Job, progress: Arc<dyn ProgressSink>) -> Result<JobOutcome, RetrievaError> {
        let root = Path::new(&job.request.folder_path);
        let files = enumerate_files(root, &job.request.patterns, self.config.max_files_per_directory)?;

        // FullIndex and Add both resolve to the same enumerate-chunk-embed-upsert
        // walk: the Storage Protocol has no delete-by-path operation, so there is
        // no stale-chunk removal to skip for an incremental Add.
        let mut files_processed: u64 = 0;
        let mut total_chunks: u64 = 0;
        let mut buffer: Vec<PendingChunk> = Vec::new();

        for path in &files {
            let relative_path = path.strip_prefix(root).unwrap_or(path).to_string_lossy().into_owned();

            let Ok(bytes) = std::fs::read(path) else {
                tracing::warn!(file = %relative_path, "could not read file, skipping");
                continue;
            };
            let Ok(content) = String::from_utf8(bytes) else {
                tracing::warn!(file = %relative_path, "skipping non-UTF-8 file");
                continue;
            };

            let chunks = self.chunk_file(
                &relative_path,
                &content,
                job.request.chunking.max_chunk_tokens,
                job.request.chunking.overlap_tokens,
                job.request.chunking.include_code,
            );
            buffer.extend(chunks);
            files_processed = files_processed.saturating_add(1);

            progress
                .report(JobProgress {
                    files_processed,
                    files_total: u64::try_from(files.len()).unwrap_or(u64::MAX),
                    chunks_created: total_chunks.saturating_add(u64::try_from(buffer.len()).unwrap_or(u64::MAX)),
                    current_file: Some(relative_path),
                })
                .await;

            if buffer.len() >= self.config.embedding_batch_size {
                let flushed = std::mem::take(&mut buffer);
                total_chunks = total_chunks.saturating_add(self.embed_and_upsert(flushed).await?);

                if progress.cancel_requested().await {
                    return Ok(JobOutcome {
                        total_documents: files_processed,
                        total_chunks,
                    });
                }
            }
        }

        total_chunks = total_chunks.saturating_add(self.embed_and_upsert(buffer).await?);

        progress
            .report(JobProgress {
                files_processed,
                files_total: files_processed,
                chunks_created: total_chunks,
                current_file: None,
            })
            .await;

        Ok(JobOutcome {
            total_documents: files_processed,
            total_chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieva_embeddings::EmbeddingResult;
    use retrieva_storage::model::{EmbeddingMetadata, Filter, SearchResult};
    use retrieva_storage::stable_chunk_id as storage_stable_chunk_id;
    use std::sync::Mutex;
    use tokio::sync::Mutex as AsyncMutex;
    use uuid::Uuid;

    struct StubEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddings {
        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }

        fn embedding_dimension(&self) -> usize {
            3
        }

        fn max_tokens(&self) -> usize {
            512
        }

        fn model_name(&self) -> &str {
            "stub-embedder"
        }

        async fn is_ready(&self) -> bool {
            true
        }

        async fn ensure_ready(&self) -> EmbeddingResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubBackend {
        upserted: Mutex<Vec<Chunk>>,
    }

    #[async_trait]
    impl StorageBackend for StubBackend {
        async fn initialize(&self) -> Result<(), RetrievaError> {
            Ok(())
        }

        async fn upsert(&self, records: &[Chunk]) -> Result<(), RetrievaError> {
            self.upserted.lock().unwrap().extend_from_slice(records);
            Ok(())
        }

        async fn vector_search(&self, _: &[f32], _: usize, _: f32, _: &Filter) -> Result<Vec<SearchResult>, RetrievaError> {
            Ok(Vec::new())
        }

        async fn keyword_search(&self, _: &str, _: usize, _: &Filter) -> Result<Vec<SearchResult>, RetrievaError> {
            Ok(Vec::new())
        }

        async fn get_count(&self, _: &Filter) -> Result<usize, RetrievaError> {
            Ok(self.upserted.lock().unwrap().len())
        }

        async fn get_by_id(&self, chunk_id: Uuid) -> Result<Option<Chunk>, RetrievaError> {
            Ok(self.upserted.lock().unwrap().iter().find(|c| c.id == chunk_id).cloned())
        }

        async fn reset(&self) -> Result<(), RetrievaError> {
            self.upserted.lock().unwrap().clear();
            Ok(())
        }

        async fn get_embedding_metadata(&self) -> Result<Option<EmbeddingMetadata>, RetrievaError> {
            Ok(None)
        }

        async fn set_embedding_metadata(&self, _: EmbeddingMetadata) -> Result<(), RetrievaError> {
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            true
        }
    }

    struct StubProgress {
        cancel: AsyncMutex<bool>,
    }

    #[async_trait]
    impl ProgressSink for StubProgress {
        async fn report(&self, _progress: JobProgress) {}

        async fn cancel_requested(&self) -> bool {
            *self.cancel.lock().await
        }
    }

    fn test_config() -> IndexingConfig {
        IndexingConfig {
            max_chunk_tokens: 512,
            split_large_units: true,
            concurrency_limit: 4,
            embedding_batch_size: 100,
            max_files_per_directory: 1000,
        }
    }

    fn sample_job(folder: &str) -> Job {
        use retrieva_queue::model::{ChunkingOptions, JobRequest, Operation};
        Job::new(JobRequest {
            folder_path: folder.to_string(),
            operation: Operation::FullIndex,
            patterns: vec![],
            chunking: ChunkingOptions {
                max_chunk_tokens: 512,
                overlap_tokens: 32,
                include_code: true,
            },
        })
    }

    #[tokio::test]
    async fn indexes_a_rust_file_into_one_chunk_per_declaration() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn one() {}\n\nfn two() {}\n").unwrap();

        let backend = Arc::new(StubBackend::default());
        let pipeline = IndexingPipeline::new(backend.clone(), Arc::new(StubEmbeddings), test_config());
        let progress: Arc<dyn ProgressSink> = Arc::new(StubProgress { cancel: AsyncMutex::new(false) });

        let outcome = pipeline.run(&sample_job(dir.path().to_str().unwrap()), progress).await.unwrap();

        assert_eq!(outcome.total_documents, 1);
        assert_eq!(outcome.total_chunks, 2);
        assert_eq!(backend.upserted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reindexing_unchanged_content_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn one() {}\n").unwrap();

        let backend = Arc::new(StubBackend::default());
        let pipeline = IndexingPipeline::new(backend.clone(), Arc::new(StubEmbeddings), test_config());

        for _ in 0..2 {
            let progress: Arc<dyn ProgressSink> = Arc::new(StubProgress { cancel: AsyncMutex::new(false) });
            pipeline.run(&sample_job(dir.path().to_str().unwrap()), progress).await.unwrap();
        }

        let ids: Vec<Uuid> = backend.upserted.lock().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
        let expected = storage_stable_chunk_id("lib.rs", 0, "fn one() {}");
        assert_eq!(ids[0], expected);
    }

    #[tokio::test]
    async fn cancellation_is_observed_after_a_flushed_batch() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            std::fs::write(dir.path().join(format!("f{i}.rs")), format!("fn f{i}() {{}}\n")).unwrap();
        }

        let mut config = test_config();
        config.embedding_batch_size = 1;
        let backend = Arc::new(StubBackend::default());
        let pipeline = IndexingPipeline::new(backend.clone(), Arc::new(StubEmbeddings), config);
        let progress = Arc::new(StubProgress { cancel: AsyncMutex::new(false) });

        *progress.cancel.lock().await = true;
        let progress_dyn: Arc<dyn ProgressSink> = progress;
        let outcome = pipeline.run(&sample_job(dir.path().to_str().unwrap()), progress_dyn).await.unwrap();

        assert!(outcome.total_documents < 3);
    }

    #[tokio::test]
    async fn documentation_files_produce_chunks_with_no_symbol_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "just some plain prose about the system\n").unwrap();

        let backend = Arc::new(StubBackend::default());
        let pipeline = IndexingPipeline::new(backend.clone(), Arc::new(StubEmbeddings), test_config());
        let progress: Arc<dyn ProgressSink> = Arc::new(StubProgress { cancel: AsyncMutex::new(false) });

        pipeline.run(&sample_job(dir.path().to_str().unwrap()), progress).await.unwrap();

        let stored = backend.upserted.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].metadata.symbol_name.is_none());
        assert_eq!(stored[0].metadata.source_kind, SourceKind::Documentation);
    }
}
