//! Token-budgeted chunking: the documentation chunker and the token
//! counters it and the code chunker share.

pub mod doc_chunker;
pub mod hf_tokenizer_counter;
pub mod tiktoken_counter;
pub mod traits;

pub use doc_chunker::{ChunkSpan, DocumentChunker};
pub use hf_tokenizer_counter::HfTokenizerCounter;
pub use tiktoken_counter::TiktokenCounter;
pub use traits::TokenCounter;
