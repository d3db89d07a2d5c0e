//! The graph store: an external collaborator for `graph` and `multi` query
//! modes. No concrete implementation ships here (Open Question decision,
//! see DESIGN.md) — traversal stays available as a signal regardless of
//! which `StorageBackend` is active.

use async_trait::async_trait;
use retrieva_common::RetrievaError;
use retrieva_storage::model::ChunkMetadata;
use uuid::Uuid;

/// A chunk reached by graph traversal, scored by accumulated path weight.
pub struct GraphHit {
    pub chunk_id: Uuid,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Traverse up to `depth` hops from entities matched to `seed_entities`.
    ///
    /// # Errors
    /// `RetrievalError` on a provider failure.
    async fn traverse(&self, seed_entities: &[String], depth: u32) -> Result<Vec<GraphHit>, RetrievaError>;
}
