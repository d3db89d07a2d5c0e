//! Closed error taxonomy shared by every layer of the retrieval engine.
//!
//! Every crate that can fail at the boundary of an external system (backend
//! I/O, an embedding/rerank/graph provider, the job queue) classifies its
//! errors into one of these kinds at the point where it has the context to
//! do so, then wraps them in [`RetrievaError`]. The HTTP surface maps each
//! kind to a status code; see `retrieva-api::error` for that mapping.

use std::fmt;
use thiserror::Error;

/// The kind of failure, independent of which component raised it.
///
/// Kept deliberately small and closed: new failure modes should be mapped
/// onto one of these, not added as a new variant, so that every caller's
/// `match` stays exhaustive and the HTTP mapping in `retrieva-api` never
/// needs to special-case an unknown kind.
#[derive(Debug, Error)]
pub enum RetrievaError {
    /// Invalid backend selection, dimension mismatch with stored data,
    /// unknown enum value. Fatal at startup; never caught at request time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backend not initialized, pool exhausted, or transport failure.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Unknown chunk id or job id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Empty query, malformed filter, unknown mode.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Job queue at capacity.
    #[error("queue full")]
    QueueFull,

    /// Cancel of a terminal job, or a dedupe hit being reported as a non-error.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Provider or query exceeded its configured budget.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Every retrieval signal failed for a query.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// A terminal failure inside an indexing job. Persisted into the job
    /// record rather than propagated to a caller.
    #[error("indexing failed: {0}")]
    Indexing(String),
}

impl RetrievaError {
    /// A short machine-readable tag for the `kind` field of the structured
    /// error body returned to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::BackendUnavailable(_) => "BackendUnavailable",
            Self::NotFound(_) => "NotFound",
            Self::InvalidInput(_) => "InvalidInput",
            Self::QueueFull => "QueueFull",
            Self::Conflict(_) => "Conflict",
            Self::Timeout(_) => "Timeout",
            Self::Retrieval(_) => "RetrievalError",
            Self::Indexing(_) => "IndexingError",
        }
    }

    /// Remediation text shown to clients when we have something actionable
    /// to say beyond the error message itself.
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::Configuration(msg) if msg.contains("dimension") => {
                Some("reset the index or switch providers so stored and configured dimensions match".to_string())
            }
            Self::QueueFull => Some("wait for a running job to finish, or cancel one".to_string()),
            _ => None,
        }
    }

    pub fn configuration(msg: impl fmt::Display) -> Self {
        Self::Configuration(msg.to_string())
    }

    pub fn backend_unavailable(msg: impl fmt::Display) -> Self {
        Self::BackendUnavailable(msg.to_string())
    }

    pub fn not_found(msg: impl fmt::Display) -> Self {
        Self::NotFound(msg.to_string())
    }

    pub fn invalid_input(msg: impl fmt::Display) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    pub fn conflict(msg: impl fmt::Display) -> Self {
        Self::Conflict(msg.to_string())
    }

    pub fn timeout(msg: impl fmt::Display) -> Self {
        Self::Timeout(msg.to_string())
    }

    pub fn retrieval(msg: impl fmt::Display) -> Self {
        Self::Retrieval(msg.to_string())
    }

    pub fn indexing(msg: impl fmt::Display) -> Self {
        Self::Indexing(msg.to_string())
    }
}

/// Structured, user-visible error body: kind, a short message, and optional
/// remediation text.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    pub remediation: Option<String>,
}

impl From<&RetrievaError> for ErrorBody {
    fn from(err: &RetrievaError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            remediation: err.remediation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_carries_remediation() {
        let err = RetrievaError::configuration(
            "dimension 3072 in store does not match configured provider dimension 1024",
        );
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.remediation().is_some());
    }

    #[test]
    fn queue_full_has_fixed_message() {
        let err = RetrievaError::QueueFull;
        assert_eq!(err.kind(), "QueueFull");
        assert_eq!(err.to_string(), "queue full");
    }
}
