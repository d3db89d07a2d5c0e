//! Tantivy-backed keyword index: tokenized full-text search alongside the
//! vector store.
//!
//! Tantivy's reader/writer API is synchronous; every call into it is
//! dispatched to a blocking thread via [`tokio::task::spawn_blocking`] so it
//! never stalls the async query path.

use std::path::Path;
use std::sync::{Arc, Mutex};

use retrieva_common::RetrievaError;
use retrieva_storage::{Chunk, ChunkMetadata, Filter, SearchResult};
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, Term};
use uuid::Uuid;

use crate::error::{from_query_parser, from_tantivy};

struct Fields {
    id: Field,
    text: Field,
    metadata: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let id = builder.add_text_field("id", STRING | STORED);
    let text = builder.add_text_field("text", TEXT | STORED);
    let metadata = builder.add_text_field("metadata", STORED);
    (builder.build(), Fields { id, text, metadata })
}

pub struct KeywordIndex {
    index: Index,
    fields: Fields,
    writer: Arc<Mutex<IndexWriter>>,
    reader: IndexReader,
}

impl KeywordIndex {
    pub fn open(path: &Path) -> Result<Self, RetrievaError> {
        std::fs::create_dir_all(path)
            .map_err(|e| RetrievaError::backend_unavailable(format!("creating tantivy directory: {e}")))?;

        let (schema, fields) = build_schema();
        let dir = tantivy::directory::MmapDirectory::open(path)
            .map_err(|e| RetrievaError::backend_unavailable(format!("opening tantivy directory: {e}")))?;
        let index = Index::open_or_create(dir, schema).map_err(from_tantivy)?;
        let writer = index.writer(50_000_000).map_err(from_tantivy)?;
        let reader = index.reader().map_err(from_tantivy)?;

        Ok(Self {
            index,
            fields,
            writer: Arc::new(Mutex::new(writer)),
            reader,
        })
    }

    pub async fn upsert(&self, records: Vec<Chunk>) -> Result<(), RetrievaError> {
        let id_field = self.fields.id;
        let text_field = self.fields.text;
        let metadata_field = self.fields.metadata;
        let writer = self.writer_handle();

        tokio::task::spawn_blocking(move || -> Result<(), RetrievaError> {
            let mut writer = writer.lock().expect("tantivy writer lock poisoned");
            for record in &records {
                writer.delete_term(Term::from_field_text(id_field, &record.id.to_string()));
            }
            for record in &records {
                let metadata_json = serde_json::to_string(&record.metadata).unwrap_or_default();
                writer
                    .add_document(doc!(
                        id_field => record.id.to_string(),
                        text_field => record.text.clone(),
                        metadata_field => metadata_json,
                    ))
                    .map_err(from_tantivy)?;
            }
            writer.commit().map_err(from_tantivy)?;
            Ok(())
        })
        .await
        .map_err(|e| RetrievaError::backend_unavailable(format!("tantivy writer task panicked: {e}")))??;

        self.reader.reload().map_err(from_tantivy)?;
        Ok(())
    }

    pub async fn search(&self, query: &str, top_k: usize, filter: &Filter) -> Result<Vec<SearchResult>, RetrievaError> {
        let index = self.index.clone();
        let text_field = self.fields.text;
        let id_field = self.fields.id;
        let metadata_field = self.fields.metadata;
        let reader = self.reader.clone();
        let query = query.to_string();
        let filter = filter.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<SearchResult>, RetrievaError> {
            let searcher = reader.searcher();
            let parser = QueryParser::for_index(&index, vec![text_field]);
            let parsed = parser.parse_query(&query).map_err(from_query_parser)?;
            let candidates = (top_k.saturating_mul(4)).max(top_k).max(1);
            let top_docs = searcher
                .search(&parsed, &TopDocs::with_limit(candidates))
                .map_err(from_tantivy)?;

            let max_score = top_docs.iter().map(|(score, _)| *score).fold(0.0_f32, f32::max);
            let mut results = Vec::new();
            for (score, address) in top_docs {
                let retrieved = searcher.doc::<tantivy::TantivyDocument>(address).map_err(from_tantivy)?;
                let chunk = document_to_chunk(&retrieved, id_field, text_field, metadata_field);
                if !filter.matches(&chunk.1) {
                    continue;
                }
                let normalized = if max_score > 0.0 { score / max_score } else { 0.0 };
                results.push(SearchResult {
                    chunk_id: chunk.0,
                    text: chunk.2,
                    metadata: chunk.1,
                    score: normalized,
                    signal_scores: retrieva_storage::model::SignalScores {
                        keyword: Some(normalized),
                        ..Default::default()
                    },
                });
            }
            results.truncate(top_k);
            Ok(results)
        })
        .await
        .map_err(|e| RetrievaError::backend_unavailable(format!("tantivy search task panicked: {e}")))?
    }

    pub async fn get_by_id(&self, chunk_id: Uuid) -> Result<Option<(String, ChunkMetadata)>, RetrievaError> {
        let id_field = self.fields.id;
        let text_field = self.fields.text;
        let metadata_field = self.fields.metadata;
        let reader = self.reader.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<(String, ChunkMetadata)>, RetrievaError> {
            let searcher = reader.searcher();
            let term = Term::from_field_text(id_field, &chunk_id.to_string());
            let query = TermQuery::new(term, IndexRecordOption::Basic);
            let top_docs = searcher.search(&query, &TopDocs::with_limit(1)).map_err(from_tantivy)?;
            let Some((_, address)) = top_docs.into_iter().next() else {
                return Ok(None);
            };
            let retrieved = searcher.doc::<tantivy::TantivyDocument>(address).map_err(from_tantivy)?;
            let (_, metadata, text) = document_to_chunk(&retrieved, id_field, text_field, metadata_field);
            Ok(Some((text, metadata)))
        })
        .await
        .map_err(|e| RetrievaError::backend_unavailable(format!("tantivy lookup task panicked: {e}")))?
    }

    pub async fn count(&self, filter: &Filter) -> Result<usize, RetrievaError> {
        let reader = self.reader.clone();
        let id_field = self.fields.id;
        let text_field = self.fields.text;
        let metadata_field = self.fields.metadata;
        let filter = filter.clone();

        tokio::task::spawn_blocking(move || -> Result<usize, RetrievaError> {
            let searcher = reader.searcher();
            if filter.is_empty() {
                return Ok(searcher.num_docs() as usize);
            }
            let top_docs = searcher
                .search(&AllQuery, &TopDocs::with_limit(searcher.num_docs() as usize))
                .map_err(from_tantivy)?;
            let mut count = 0;
            for (_, address) in top_docs {
                let retrieved = searcher.doc::<tantivy::TantivyDocument>(address).map_err(from_tantivy)?;
                let (_, metadata, _) = document_to_chunk(&retrieved, id_field, text_field, metadata_field);
                if filter.matches(&metadata) {
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
        .map_err(|e| RetrievaError::backend_unavailable(format!("tantivy count task panicked: {e}")))?
    }

    pub async fn reset(&self) -> Result<(), RetrievaError> {
        let writer = self.writer_handle();
        tokio::task::spawn_blocking(move || -> Result<(), RetrievaError> {
            let mut writer = writer.lock().expect("tantivy writer lock poisoned");
            writer.delete_all_documents().map_err(from_tantivy)?;
            writer.commit().map_err(from_tantivy)?;
            Ok(())
        })
        .await
        .map_err(|e| RetrievaError::backend_unavailable(format!("tantivy reset task panicked: {e}")))??;
        self.reader.reload().map_err(from_tantivy)?;
        Ok(())
    }

    fn writer_handle(&self) -> Arc<Mutex<IndexWriter>> {
        Arc::clone(&self.writer)
    }
}

fn document_to_chunk(
    document: &tantivy::TantivyDocument,
    id_field: Field,
    text_field: Field,
    metadata_field: Field,
) -> (Uuid, ChunkMetadata, String) {
    use tantivy::schema::document::Value;

    let id = document
        .get_first(id_field)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::nil);
    let text = document
        .get_first(text_field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let metadata = document
        .get_first(metadata_field)
        .and_then(|v| v.as_str())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    (id, metadata, text)
}
