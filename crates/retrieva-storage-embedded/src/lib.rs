//! The embedded storage backend: a file-backed LanceDB vector table paired
//! with a Tantivy keyword index, implementing the Storage Protocol from
//! `retrieva-storage` for single-machine, no-external-services deployments.

pub mod backend;
pub mod error;
pub mod keyword;
pub mod schema;
pub mod vector;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use backend::EmbeddedBackend;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockBackend;
