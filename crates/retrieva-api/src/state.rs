//! Application state shared across Axum handlers.
//!
//! Built once at startup by [`crate::bootstrap`] and cloned into every
//! request (all fields are `Arc`-backed, so cloning is cheap).

use std::sync::Arc;

use retrieva_embeddings::EmbeddingProvider;
use retrieva_queue::JobQueue;
use retrieva_search::SearchPipeline;
use retrieva_storage::{StorageBackend, StorageKind};

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn StorageBackend>,
    pub storage_kind: StorageKind,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub search: Arc<SearchPipeline>,
    pub queue: Arc<JobQueue>,
}
