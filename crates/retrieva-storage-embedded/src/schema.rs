//! Arrow schema for the single `chunks` table.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

pub const TABLE_NAME: &str = "chunks";

/// `metadata` and `embedding_metadata` are stored as JSON strings; LanceDB
/// has no native struct-column support that survives round-tripping through
/// `RecordBatchIterator` as cleanly as a flat schema does.
pub fn chunks_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                i32::try_from(vector_dim).unwrap_or(i32::MAX),
            ),
            false,
        ),
    ]))
}
