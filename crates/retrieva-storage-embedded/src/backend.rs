//! The embedded `StorageBackend`: a file-backed LanceDB vector table plus a
//! Tantivy keyword index, one pair per project's `data_dir`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use retrieva_common::RetrievaError;
use retrieva_storage::{Chunk, EmbeddingMetadata, Filter, SearchResult, StorageBackend};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::keyword::KeywordIndex;
use crate::vector::VectorStore;

const EMBEDDING_METADATA_FILE: &str = "embedding_metadata.json";

/// File-backed embedded backend. Inserts into the vector table and the
/// keyword index are serialized behind `write_lock` so a concurrent reader
/// never observes a chunk present in one and absent from the other; reads
/// from either index proceed concurrently.
pub struct EmbeddedBackend {
    data_dir: PathBuf,
    vector: VectorStore,
    keyword: KeywordIndex,
    write_lock: Mutex<()>,
    expected: EmbeddingMetadata,
    initialized: AtomicBool,
}

impl EmbeddedBackend {
    /// Opens (creating if absent) the LanceDB table and Tantivy index under
    /// `data_dir`. Does not yet validate embedding metadata; call
    /// [`StorageBackend::initialize`] for that.
    ///
    /// # Errors
    /// `BackendUnavailable` if either index cannot be opened or created.
    pub async fn open(data_dir: impl Into<PathBuf>, expected: EmbeddingMetadata) -> Result<Self, RetrievaError> {
        let data_dir = data_dir.into();
        let vector = VectorStore::open(&data_dir.join("vectors"), expected.dimension).await?;
        let keyword_path = data_dir.join("keyword");
        let keyword = tokio::task::spawn_blocking(move || KeywordIndex::open(&keyword_path))
            .await
            .map_err(|e| RetrievaError::backend_unavailable(format!("opening keyword index: {e}")))??;

        Ok(Self {
            data_dir,
            vector,
            keyword,
            write_lock: Mutex::new(()),
            expected,
            initialized: AtomicBool::new(false),
        })
    }

    fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(EMBEDDING_METADATA_FILE)
    }

    fn read_metadata(&self) -> Result<Option<EmbeddingMetadata>, RetrievaError> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| RetrievaError::backend_unavailable(format!("reading embedding metadata: {e}")))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| RetrievaError::backend_unavailable(format!("parsing embedding metadata: {e}")))
    }

    fn write_metadata(&self, metadata: &EmbeddingMetadata) -> Result<(), RetrievaError> {
        let raw = serde_json::to_string(metadata)
            .map_err(|e| RetrievaError::backend_unavailable(format!("serializing embedding metadata: {e}")))?;
        std::fs::write(self.metadata_path(), raw)
            .map_err(|e| RetrievaError::backend_unavailable(format!("writing embedding metadata: {e}")))
    }
}

#[async_trait]
impl StorageBackend for EmbeddedBackend {
    async fn initialize(&self) -> Result<(), RetrievaError> {
        if let Some(stored) = self.read_metadata()? {
            if stored.dimension != self.expected.dimension {
                return Err(RetrievaError::configuration(format!(
                    "stored embedding dimension {} does not match configured dimension {}",
                    stored.dimension, self.expected.dimension
                )));
            }
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert(&self, records: &[Chunk]) -> Result<(), RetrievaError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in records {
            if record.embedding.len() != self.expected.dimension {
                return Err(RetrievaError::configuration(format!(
                    "chunk {} has embedding dimension {}, expected {}",
                    record.id,
                    record.embedding.len(),
                    self.expected.dimension
                )));
            }
        }

        let _guard = self.write_lock.lock().await;
        self.vector.upsert(records).await?;
        self.keyword.upsert(records.to_vec()).await?;

        if self.read_metadata()?.is_none() {
            self.write_metadata(&self.expected)?;
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
        if embedding.len() != self.expected.dimension {
            return Err(RetrievaError::invalid_input(format!(
                "query embedding has dimension {}, expected {}",
                embedding.len(),
                self.expected.dimension
            )));
        }
        self.vector.search(embedding, top_k, threshold, filter).await
    }

    async fn keyword_search(&self, query: &str, top_k: usize, filter: &Filter) -> Result<Vec<SearchResult>, RetrievaError> {
        self.keyword.search(query, top_k, filter).await
    }

    async fn get_count(&self, filter: &Filter) -> Result<usize, RetrievaError> {
        self.vector.count(filter).await
    }

    async fn get_by_id(&self, chunk_id: Uuid) -> Result<Option<Chunk>, RetrievaError> {
        self.vector.get_by_id(chunk_id).await
    }

    async fn reset(&self) -> Result<(), RetrievaError> {
        let _guard = self.write_lock.lock().await;
        self.vector.reset().await?;
        self.keyword.reset().await?;
        let path = self.metadata_path();
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| RetrievaError::backend_unavailable(format!("removing embedding metadata: {e}")))?;
        }
        Ok(())
    }

    async fn get_embedding_metadata(&self) -> Result<Option<EmbeddingMetadata>, RetrievaError> {
        self.read_metadata()
    }

    async fn set_embedding_metadata(&self, metadata: EmbeddingMetadata) -> Result<(), RetrievaError> {
        let _guard = self.write_lock.lock().await;
        self.write_metadata(&metadata)
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}
