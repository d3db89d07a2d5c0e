pub mod dispatcher;
pub mod model;
pub mod pool;
pub mod service;
pub mod traits;

pub use model::EmbeddingModel;
pub use pool::EmbeddingModelPool;
pub use service::DefaultEmbeddingProvider;
pub use traits::EmbeddingProvider;
// EmbeddingConfig now comes from retrieva-config crate to eliminate duplication
