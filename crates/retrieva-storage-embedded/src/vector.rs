//! LanceDB-backed vector storage: one table per embedded instance.

use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use retrieva_common::RetrievaError;
use retrieva_storage::{Chunk, Filter, SearchResult};
use uuid::Uuid;

use crate::error::{from_arrow, from_lance};
use crate::schema::{chunks_schema, TABLE_NAME};

pub struct VectorStore {
    connection: Connection,
    dimension: usize,
}

impl VectorStore {
    pub async fn open(db_path: &std::path::Path, dimension: usize) -> Result<Self, RetrievaError> {
        tokio::fs::create_dir_all(db_path)
            .await
            .map_err(|e| RetrievaError::backend_unavailable(format!("creating lancedb directory: {e}")))?;

        let connection = lancedb::connect(&db_path.to_string_lossy())
            .execute()
            .await
            .map_err(from_lance)?;

        let table_names = connection.table_names().execute().await.map_err(from_lance)?;
        if !table_names.iter().any(|name| name == TABLE_NAME) {
            connection
                .create_empty_table(TABLE_NAME, chunks_schema(dimension))
                .execute()
                .await
                .map_err(from_lance)?;
        }

        Ok(Self { connection, dimension })
    }

    pub async fn upsert(&self, records: &[Chunk]) -> Result<(), RetrievaError> {
        if records.is_empty() {
            return Ok(());
        }
        let table = self.table().await?;

        let ids: Vec<String> = records.iter().map(|c| c.id.to_string()).collect();
        let ids_list = ids
            .iter()
            .map(|id| format!("'{id}'"))
            .collect::<Vec<_>>()
            .join(", ");
        table
            .delete(&format!("id IN ({ids_list})"))
            .await
            .map_err(from_lance)?;

        let batch = chunks_to_batch(records, self.dimension).map_err(from_arrow)?;
        let iter = RecordBatchIterator::new(vec![Ok(batch)], chunks_schema(self.dimension));
        table.add(Box::new(iter)).execute().await.map_err(from_lance)?;
        Ok(())
    }

    pub async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
        filter: &Filter,
    ) -> Result<Vec<SearchResult>, RetrievaError> {
        let table = self.table().await?;
        let query = table.vector_search(embedding.to_vec()).map_err(from_lance)?.limit(top_k);

        let batches: Vec<RecordBatch> = query.execute().await.map_err(from_lance)?.try_collect().await.map_err(from_lance)?;

        let mut results = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let chunk = batch_to_chunk(batch, row, self.dimension).map_err(from_arrow)?;
                if !filter.matches(&chunk.metadata) {
                    continue;
                }
                let distance = batch
                    .column_by_name("_distance")
                    .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
                    .map(|arr| arr.value(row))
                    .unwrap_or(0.0);
                let score = 1.0 / (1.0 + distance.max(0.0));
                if score < threshold {
                    continue;
                }
                results.push(SearchResult {
                    chunk_id: chunk.id,
                    text: chunk.text,
                    metadata: chunk.metadata,
                    score,
                    signal_scores: retrieva_storage::model::SignalScores {
                        vector: Some(score),
                        ..Default::default()
                    },
                });
            }
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    pub async fn get_by_id(&self, chunk_id: Uuid) -> Result<Option<Chunk>, RetrievaError> {
        let table = self.table().await?;
        let id_str = chunk_id.to_string();
        let batches: Vec<RecordBatch> = table
            .query()
            .only_if(format!("id = '{id_str}'"))
            .execute()
            .await
            .map_err(from_lance)?
            .try_collect()
            .await
            .map_err(from_lance)?;

        for batch in &batches {
            if batch.num_rows() > 0 {
                return Ok(Some(batch_to_chunk(batch, 0, self.dimension).map_err(from_arrow)?));
            }
        }
        Ok(None)
    }

    pub async fn count(&self, filter: &Filter) -> Result<usize, RetrievaError> {
        if filter.is_empty() {
            let table = self.table().await?;
            return table.count_rows(None).await.map_err(from_lance);
        }
        let table = self.table().await?;
        let batches: Vec<RecordBatch> = table.query().execute().await.map_err(from_lance)?.try_collect().await.map_err(from_lance)?;
        let mut count = 0;
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let chunk = batch_to_chunk(batch, row, self.dimension).map_err(from_arrow)?;
                if filter.matches(&chunk.metadata) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    pub async fn reset(&self) -> Result<(), RetrievaError> {
        let table = self.table().await?;
        table.delete("true").await.map_err(from_lance)?;
        Ok(())
    }

    async fn table(&self) -> Result<lancedb::Table, RetrievaError> {
        self.connection.open_table(TABLE_NAME).execute().await.map_err(from_lance)
    }
}

fn chunks_to_batch(records: &[Chunk], dimension: usize) -> Result<RecordBatch, arrow_schema::ArrowError> {
    let ids = StringArray::from(records.iter().map(|c| c.id.to_string()).collect::<Vec<_>>());
    let texts = StringArray::from(records.iter().map(|c| c.text.clone()).collect::<Vec<_>>());
    let metadata = StringArray::from(
        records
            .iter()
            .map(|c| serde_json::to_string(&c.metadata).unwrap_or_default())
            .collect::<Vec<_>>(),
    );

    let mut flat = Vec::with_capacity(records.len() * dimension);
    for record in records {
        let mut padded = record.embedding.clone();
        padded.resize(dimension, 0.0);
        flat.extend(padded);
    }
    let values = Float32Array::from(flat);
    let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
    let embeddings = FixedSizeListArray::try_new(field, i32::try_from(dimension).unwrap_or(i32::MAX), Arc::new(values), None)?;

    RecordBatch::try_new(
        chunks_schema(dimension),
        vec![Arc::new(ids), Arc::new(texts), Arc::new(metadata), Arc::new(embeddings)],
    )
}

fn batch_to_chunk(batch: &RecordBatch, row: usize, dimension: usize) -> Result<Chunk, arrow_schema::ArrowError> {
    let id = column_str(batch, "id", row)?;
    let text = column_str(batch, "text", row)?;
    let metadata_json = column_str(batch, "metadata", row)?;
    let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();

    let embedding = batch
        .column_by_name("embedding")
        .and_then(|col| col.as_any().downcast_ref::<FixedSizeListArray>())
        .map(|list| {
            let values = list.value(row);
            let floats = values.as_any().downcast_ref::<Float32Array>();
            floats.map(|f| f.values().to_vec()).unwrap_or_else(|| vec![0.0; dimension])
        })
        .unwrap_or_else(|| vec![0.0; dimension]);

    Ok(Chunk {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        text,
        embedding,
        metadata,
    })
}

fn column_str(batch: &RecordBatch, name: &str, row: usize) -> Result<String, arrow_schema::ArrowError> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| arrow_schema::ArrowError::SchemaError(format!("missing column {name}")))?;
    let arr = col
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| arrow_schema::ArrowError::SchemaError(format!("column {name} is not Utf8")))?;
    Ok(arr.value(row).to_string())
}
