//! Common utilities and patterns shared across Retrieva crates
//!
//! This crate provides shared functionality to reduce duplication across
//! the various Retrieva components: the closed error taxonomy, correlation
//! IDs for cross-component tracing, error sanitization, and process-wide
//! initialization.

pub mod error;
pub mod error_sanitizer;
pub mod init;
pub mod taxonomy;
pub mod tracing;

pub use error::{CommonError, ErrorContext};
pub use init::initialize_environment;
pub use taxonomy::{ErrorBody, RetrievaError};
pub use tracing::CorrelationId;
