//! Maps the shared error taxonomy onto HTTP responses.
//!
//! Every handler returns `crate::error::Result<T>`; axum turns an `Err`
//! into a response by way of [`ApiError`], which classifies the error's
//! `kind()` into a status code and serializes `retrieva_common::ErrorBody`
//! as the JSON body. Handlers never construct a status code themselves.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use retrieva_common::{ErrorBody, RetrievaError};

/// Newtype so `RetrievaError` can implement axum's `IntoResponse` without
/// that trait living in `retrieva-common`, which has no axum dependency.
pub struct ApiError(pub RetrievaError);

impl From<RetrievaError> for ApiError {
    fn from(err: RetrievaError) -> Self {
        Self(err)
    }
}

fn status_for(err: &RetrievaError) -> StatusCode {
    match err {
        RetrievaError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RetrievaError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RetrievaError::NotFound(_) => StatusCode::NOT_FOUND,
        RetrievaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RetrievaError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
        RetrievaError::Conflict(_) => StatusCode::CONFLICT,
        RetrievaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        RetrievaError::Retrieval(_) => StatusCode::INTERNAL_SERVER_ERROR,
        // Indexing failures are persisted into the job record by the
        // worker, not returned from a handler; this arm exists only to
        // keep the match exhaustive.
        RetrievaError::Indexing(_) => StatusCode::OK,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "request failed");
        } else {
            tracing::warn!(kind = self.0.kind(), error = %self.0, "request rejected");
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
