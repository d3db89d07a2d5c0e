//! The data model that flows through the Storage Protocol.

use std::collections::HashMap;
use uuid::Uuid;

/// Where a chunk's content originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Documentation,
    #[default]
    Code,
}

/// Metadata carried alongside a chunk's text and embedding.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ChunkMetadata {
    pub source_path: String,
    pub source_kind: SourceKind,
    pub language: Option<String>,
    pub symbol_name: Option<String>,
    pub symbol_kind: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub docstring: Option<String>,
}

/// The unit of retrieval: a chunk of text with its embedding and metadata.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Per-signal diagnostic scores preserved alongside a result's composite score.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SignalScores {
    pub vector: Option<f32>,
    pub keyword: Option<f32>,
    pub graph: Option<f32>,
    pub rerank: Option<f32>,
}

/// The unit of response: a chunk plus its composite score.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub chunk_id: Uuid,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Composite score in `[0, 1]`. Results are always ordered by this,
    /// descending, ties broken by `chunk_id` lexicographic order.
    pub score: f32,
    pub signal_scores: SignalScores,
}

/// One record per backend instance: the provider/model/dimension that
/// produced every embedding currently stored there.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingMetadata {
    pub provider: String,
    pub model: String,
    pub dimension: usize,
}

/// A constraint over a chunk's metadata: equality or set-membership over a
/// string-valued field. Closed so every backend can translate it into its
/// native query language without interpreting arbitrary JSON at query time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldConstraint {
    Eq { value: String },
    In { values: Vec<String> },
}

/// A metadata filter: a conjunction of per-field constraints.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Filter {
    pub constraints: HashMap<String, FieldConstraint>,
}

impl Filter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether `metadata` satisfies every constraint in this filter.
    #[must_use]
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.constraints.iter().all(|(field, constraint)| {
            let Some(value) = field_value(metadata, field) else {
                return false;
            };
            match constraint {
                FieldConstraint::Eq { value: expected } => &value == expected,
                FieldConstraint::In { values } => values.contains(&value),
            }
        })
    }
}

fn field_value(metadata: &ChunkMetadata, field: &str) -> Option<String> {
    match field {
        "source_path" => Some(metadata.source_path.clone()),
        "language" => metadata.language.clone(),
        "symbol_name" => metadata.symbol_name.clone(),
        "symbol_kind" => metadata.symbol_kind.clone(),
        "source_kind" => Some(match metadata.source_kind {
            SourceKind::Documentation => "documentation".to_string(),
            SourceKind::Code => "code".to_string(),
        }),
        _ => None,
    }
}

/// A similarity metric a backend's vector index may be configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    L2,
    InnerProduct,
}
