//! Retrieva Retrieval Pipeline.
//!
//! Fuses vector, keyword, and graph signals over whichever [`StorageBackend`]
//! is active, with optional two-stage reranking behind a latency budget.
//!
//! [`StorageBackend`]: retrieva_storage::StorageBackend

pub mod graph;
pub mod pipeline;
pub mod query;
pub mod rerank;
pub mod rrf;

pub use graph::{GraphHit, GraphStore};
pub use pipeline::SearchPipeline;
pub use query::{QueryMode, QueryParams, QueryResponse, ResolvedParams};
pub use rerank::{RerankedCandidate, Reranker};
pub use rrf::{reciprocal_rank_fusion, SignalRanking};
