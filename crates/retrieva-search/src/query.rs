//! Query modes and parameters for the Retrieval Pipeline's entry point.

use retrieva_storage::model::{Filter, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Vector,
    Keyword,
    Hybrid,
    Graph,
    Multi,
}

/// Overridable-per-request parameters; `None` means "use the configured
/// default".
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub top_k: Option<usize>,
    pub similarity_threshold: Option<f32>,
    pub rrf_k: Option<u32>,
    pub alpha: Option<f32>,
    pub filter: Filter,
    pub traversal_depth: Option<u32>,
}

/// The resolved parameters a single query runs with, after defaults are
/// applied.
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    pub top_k: usize,
    pub candidate_k: usize,
    pub similarity_threshold: f32,
    pub rrf_k: u32,
    pub alpha: f32,
    pub filter: Filter,
    pub traversal_depth: u32,
}

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub results: Vec<SearchResult>,
    /// Non-fatal degradations observed while answering this query (a
    /// signal failed in hybrid/multi mode, or the reranker degraded).
    pub warnings: Vec<String>,
}
