//! The reranker: an external collaborator consulted after fusion. No
//! concrete provider ships here; callers inject an implementation (a
//! hosted cross-encoder, a local model, whatever is available).

use async_trait::async_trait;
use retrieva_common::RetrievaError;
use uuid::Uuid;

/// A candidate's reranked score, keyed by chunk id so the pipeline can
/// splice it back onto the fused result it came from.
pub struct RerankedCandidate {
    pub chunk_id: Uuid,
    pub score: f32,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score `candidates` (text, chunk id pairs) against `query`.
    ///
    /// # Errors
    /// `RetrievalError` on a provider/transport failure; the pipeline
    /// treats this as a degrade-not-fail signal, not a hard error.
    async fn rerank(
        &self,
        query: &str,
        candidates: &[(Uuid, String)],
    ) -> Result<Vec<RerankedCandidate>, RetrievaError>;
}
