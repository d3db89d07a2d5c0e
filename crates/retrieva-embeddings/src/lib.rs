//! Retrieva embedding generation crate
//!
//! This crate provides ML-based embedding generation for semantic code search.
//! It handles the conversion of code text into high-dimensional vectors using
//! local BERT-family transformer models.

pub mod embedding;
pub mod error;

// Re-export main types
pub use embedding::{DefaultEmbeddingProvider, EmbeddingModel, EmbeddingProvider};
pub use error::{EmbeddingError, EmbeddingResult};
