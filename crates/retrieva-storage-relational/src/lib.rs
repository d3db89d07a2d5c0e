//! The relational storage backend: `PostgreSQL` + `pgvector` + native
//! full-text search, implementing the Storage Protocol from
//! `retrieva-storage`.

pub mod backend;
pub mod error;
pub mod migrations;
pub mod pool_builder;
pub mod schema;

pub use backend::RelationalBackend;
