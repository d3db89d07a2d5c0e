//! Indexing pipeline: walks a folder, chunks files with the chunker
//! appropriate to their kind, embeds chunks in batches, and upserts them
//! into the active storage backend.

pub mod pipeline;
pub mod walker;

pub use pipeline::IndexingPipeline;
pub use walker::enumerate_files;
