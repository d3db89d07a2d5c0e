//! Language registry and the AST-aware code chunker built on it.

pub mod code_chunker;
pub mod languages;

pub use code_chunker::{CodeChunker, ExtractedChunk};
pub use languages::{get_language_config, get_language_from_extension, LanguageConfig, LANGUAGE_REGISTRY};
