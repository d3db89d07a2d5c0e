//! The relational `StorageBackend`: `PostgreSQL` with `pgvector` for vector
//! search and native `tsvector`/`ts_rank_cd` for keyword search, one `chunks`
//! table shared by both signals.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use retrieva_common::RetrievaError;
use retrieva_config::RelationalStorageConfig;
use retrieva_storage::{Chunk, ChunkMetadata, EmbeddingMetadata, Filter, SearchResult, StorageBackend};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::from_sqlx;
use crate::schema::{self, CHUNKS_TABLE, EMBEDDING_METADATA_TABLE, VECTOR_INDEX_NAME};
use crate::{migrations, pool_builder::PoolConfigBuilder};

/// A single Postgres pool backing both the vector and keyword signals.
/// Unlike the embedded backend's two independent engines, both signals
/// live in one table, so Postgres's own transactional guarantees replace
/// the embedded backend's manual write-lock serialization.
pub struct RelationalBackend {
    pool: PgPool,
    config: RelationalStorageConfig,
    expected: EmbeddingMetadata,
    initialized: AtomicBool,
}

impl RelationalBackend {
    /// Connects, runs migrations, and ensures the ANN index exists. Does
    /// not yet validate stored embedding metadata; call
    /// [`StorageBackend::initialize`] for that.
    ///
    /// # Errors
    /// `ConfigurationError` if the password environment variable is unset;
    /// `BackendUnavailable` if the connection, migration, or index creation
    /// fails.
    pub async fn connect(config: &RelationalStorageConfig, expected: EmbeddingMetadata) -> Result<Self, RetrievaError> {
        let password = config
            .password()
            .map_err(|e| RetrievaError::configuration(format!("reading relational storage password: {e}")))?;

        let connect_options = PoolConfigBuilder::connect_options(config, &password);
        let pool = PoolConfigBuilder::options(config)
            .connect_with(connect_options)
            .await
            .map_err(from_sqlx)?;

        migrations::run_migrations(&pool).await?;

        let backend = Self {
            pool,
            config: config.clone(),
            expected,
            initialized: AtomicBool::new(false),
        };
        backend.ensure_vector_index().await?;
        Ok(backend)
    }

    async fn ensure_vector_index(&self) -> Result<(), RetrievaError> {
        let ops_class = schema::vector_ops_class(self.config.distance);
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {VECTOR_INDEX_NAME} ON {CHUNKS_TABLE} \
             USING hnsw (embedding {ops_class}) WITH (m = {}, ef_construction = {})",
            self.config.ann.m, self.config.ann.ef_construction
        );
        sqlx::query(&sql).execute(&self.pool).await.map_err(from_sqlx)?;
        Ok(())
    }

    async fn read_metadata(&self) -> Result<Option<EmbeddingMetadata>, RetrievaError> {
        let row = sqlx::query(&format!(
            "SELECT provider, model, dimension FROM {EMBEDDING_METADATA_TABLE} WHERE singleton"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;

        Ok(row.map(|row| EmbeddingMetadata {
            provider: row.get("provider"),
            model: row.get("model"),
            #[allow(clippy::cast_sign_loss)]
            dimension: row.get::<i32, _>("dimension") as usize,
        }))
    }

    async fn write_metadata(&self, metadata: &EmbeddingMetadata) -> Result<(), RetrievaError> {
        sqlx::query(&format!(
            "INSERT INTO {EMBEDDING_METADATA_TABLE} (singleton, provider, model, dimension) \
             VALUES (TRUE, $1, $2, $3) \
             ON CONFLICT (singleton) DO UPDATE SET provider = $1, model = $2, dimension = $3"
        ))
        .bind(&metadata.provider)
        .bind(&metadata.model)
        .bind(i32::try_from(metadata.dimension).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await
        .map_err(from_sqlx)?;
        Ok(())
    }

    fn row_to_result(row: &sqlx::postgres::PgRow, score: f32) -> Result<SearchResult, RetrievaError> {
        let id: Uuid = row.get("id");
        let text: String = row.get("chunk_text");
        let metadata_json: serde_json::Value = row.get("metadata");
        let metadata: ChunkMetadata = serde_json::from_value(metadata_json)
            .map_err(|e| RetrievaError::backend_unavailable(format!("decoding chunk metadata: {e}")))?;

        Ok(SearchResult {
            chunk_id: id,
            text,
            metadata,
            score,
            signal_scores: retrieva_storage::model::SignalScores::default(),
        })
    }
}

#[async_trait]
impl StorageBackend for RelationalBackend {
    async fn initialize(&self) -> Result<(), RetrievaError> {
        if let Some(stored) = self.read_metadata().await? {
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

        let mut tx = self.pool.begin().await.map_err(from_sqlx)?;
        for record in records {
            let metadata_json = serde_json::to_value(&record.metadata)
                .map_err(|e| RetrievaError::backend_unavailable(format!("encoding chunk metadata: {e}")))?;
            let embedding_literal = schema::vector_literal(&record.embedding);

            sqlx::query(&format!(
                "INSERT INTO {CHUNKS_TABLE} (id, chunk_text, metadata, embedding, text_search) \
                 VALUES ($1, $2, $3, $4::vector, to_tsvector($5, $2)) \
                 ON CONFLICT (id) DO UPDATE SET \
                   chunk_text = $2, metadata = $3, embedding = $4::vector, text_search = to_tsvector($5, $2)"
            ))
            .bind(record.id)
            .bind(&record.text)
            .bind(&metadata_json)
            .bind(&embedding_literal)
            .bind(&self.config.language)
            .execute(&mut *tx)
            .await
            .map_err(from_sqlx)?;
        }
        tx.commit().await.map_err(from_sqlx)?;

        if self.read_metadata().await?.is_none() {
            self.write_metadata(&self.expected).await?;
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

        let op = schema::distance_operator(self.config.distance);
        let fetch_n = if filter.is_empty() { top_k } else { (top_k * 4).max(top_k) };
        let embedding_literal = schema::vector_literal(embedding);

        let mut tx = self.pool.begin().await.map_err(from_sqlx)?;
        sqlx::query(&format!("SET LOCAL hnsw.ef_search = {}", self.config.ann.ef_search))
            .execute(&mut *tx)
            .await
            .map_err(from_sqlx)?;

        let rows = sqlx::query(&format!(
            "SELECT id, chunk_text, metadata, embedding {op} $1::vector AS distance \
             FROM {CHUNKS_TABLE} ORDER BY embedding {op} $1::vector LIMIT $2"
        ))
        .bind(&embedding_literal)
        .bind(i64::try_from(fetch_n).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .await
        .map_err(from_sqlx)?;
        tx.commit().await.map_err(from_sqlx)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let distance: f64 = row.get("distance");
            let score = schema::distance_to_score(distance);
            if score < threshold {
                continue;
            }
            let result = Self::row_to_result(row, score)?;
            if !filter.is_empty() && !filter.matches(&result.metadata) {
                continue;
            }
            results.push(result);
        }
        results.truncate(top_k);
        Ok(results)
    }

    async fn keyword_search(&self, query: &str, top_k: usize, filter: &Filter) -> Result<Vec<SearchResult>, RetrievaError> {
        let fetch_n = if filter.is_empty() { top_k } else { (top_k * 4).max(top_k) };

        let rows = sqlx::query(&format!(
            "SELECT id, chunk_text, metadata, \
               ts_rank_cd(text_search, plainto_tsquery($1, $2)) AS rank \
             FROM {CHUNKS_TABLE} \
             WHERE text_search @@ plainto_tsquery($1, $2) \
             ORDER BY rank DESC LIMIT $3"
        ))
        .bind(&self.config.language)
        .bind(query)
        .bind(i64::try_from(fetch_n).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx)?;

        let max_rank = rows.iter().map(|row| row.get::<f32, _>("rank")).fold(0.0_f32, f32::max);

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let rank: f32 = row.get("rank");
            let score = if max_rank > 0.0 { rank / max_rank } else { 0.0 };
            let result = Self::row_to_result(row, score)?;
            if !filter.is_empty() && !filter.matches(&result.metadata) {
                continue;
            }
            results.push(result);
        }
        results.truncate(top_k);
        Ok(results)
    }

    async fn get_count(&self, filter: &Filter) -> Result<usize, RetrievaError> {
        if filter.is_empty() {
            let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {CHUNKS_TABLE}"))
                .fetch_one(&self.pool)
                .await
                .map_err(from_sqlx)?;
            let count: i64 = row.get("count");
            return Ok(usize::try_from(count).unwrap_or(0));
        }

        let rows = sqlx::query(&format!("SELECT metadata FROM {CHUNKS_TABLE}"))
            .fetch_all(&self.pool)
            .await
            .map_err(from_sqlx)?;

        let mut count = 0;
        for row in &rows {
            let metadata_json: serde_json::Value = row.get("metadata");
            let metadata: ChunkMetadata = serde_json::from_value(metadata_json)
                .map_err(|e| RetrievaError::backend_unavailable(format!("decoding chunk metadata: {e}")))?;
            if filter.matches(&metadata) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn get_by_id(&self, chunk_id: Uuid) -> Result<Option<Chunk>, RetrievaError> {
        let row = sqlx::query(&format!(
            "SELECT id, chunk_text, metadata, embedding::text AS embedding_text \
             FROM {CHUNKS_TABLE} WHERE id = $1"
        ))
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let metadata_json: serde_json::Value = row.get("metadata");
        let metadata: ChunkMetadata = serde_json::from_value(metadata_json)
            .map_err(|e| RetrievaError::backend_unavailable(format!("decoding chunk metadata: {e}")))?;
        let embedding_text: String = row.get("embedding_text");
        let embedding = parse_vector_literal(&embedding_text)?;

        Ok(Some(Chunk {
            id: row.get("id"),
            text: row.get("chunk_text"),
            embedding,
            metadata,
        }))
    }

    async fn reset(&self) -> Result<(), RetrievaError> {
        let mut tx = self.pool.begin().await.map_err(from_sqlx)?;
        sqlx::query(&format!("TRUNCATE {CHUNKS_TABLE}"))
            .execute(&mut *tx)
            .await
            .map_err(from_sqlx)?;
        sqlx::query(&format!("DELETE FROM {EMBEDDING_METADATA_TABLE}"))
            .execute(&mut *tx)
            .await
            .map_err(from_sqlx)?;
        tx.commit().await.map_err(from_sqlx)?;
        Ok(())
    }

    async fn get_embedding_metadata(&self) -> Result<Option<EmbeddingMetadata>, RetrievaError> {
        self.read_metadata().await
    }

    async fn set_embedding_metadata(&self, metadata: EmbeddingMetadata) -> Result<(), RetrievaError> {
        self.write_metadata(&metadata).await
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

fn parse_vector_literal(text: &str) -> Result<Vec<f32>, RetrievaError> {
    let trimmed = text.trim_start_matches('[').trim_end_matches(']');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|s| {
            s.trim()
                .parse::<f32>()
                .map_err(|e| RetrievaError::backend_unavailable(format!("parsing stored embedding: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_vector_literal_round_trips_pgvector_text_output() {
        let embedding = vec![1.0_f32, -2.5, 0.0];
        let literal = schema::vector_literal(&embedding);
        assert_eq!(parse_vector_literal(&literal).unwrap(), embedding);
    }

    #[test]
    fn parse_vector_literal_handles_empty_vector() {
        assert_eq!(parse_vector_literal("[]").unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn parse_vector_literal_rejects_malformed_input() {
        assert!(parse_vector_literal("[1.0,abc]").is_err());
    }
}
