//! Liveness and detailed health/status routes.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use retrieva_storage::StorageKind;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/status", get(status))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Liveness {
    Healthy,
    Indexing,
    Degraded,
    Unhealthy,
}

#[derive(Serialize)]
struct HealthResponse {
    status: Liveness,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if !state.backend.is_initialized() {
        Liveness::Unhealthy
    } else if state.queue.list(Some(retrieva_queue::JobStatus::Running)).await.is_empty() {
        Liveness::Healthy
    } else {
        Liveness::Indexing
    };
    Json(HealthResponse { status })
}

#[derive(Serialize)]
struct QueueStatus {
    pending: usize,
    running: usize,
    done: usize,
    failed: usize,
    cancelled: usize,
}

#[derive(Serialize)]
struct CurrentJob {
    id: uuid::Uuid,
    progress_percent: f32,
}

#[derive(Serialize)]
struct StatusResponse {
    storage_kind: StorageKind,
    backend_ready: bool,
    embedding_provider: Option<String>,
    embedding_model: Option<String>,
    dimension: Option<usize>,
    queue: QueueStatus,
    current_job: Option<CurrentJob>,
}

async fn status(State(state): State<AppState>) -> crate::error::Result<Json<StatusResponse>> {
    let metadata = state.backend.get_embedding_metadata().await?;

    let all_jobs = state.queue.list(None).await;
    let count = |s: retrieva_queue::JobStatus| all_jobs.iter().filter(|j| j.status == s).count();
    let running = all_jobs.iter().find(|j| j.status == retrieva_queue::JobStatus::Running).cloned();

    let current_job = running.map(|job| {
        let percent = if job.progress.files_total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = job.progress.files_processed as f32 / job.progress.files_total as f32;
            ratio * 100.0
        };
        CurrentJob {
            id: job.id,
            progress_percent: percent,
        }
    });

    Ok(Json(StatusResponse {
        storage_kind: state.storage_kind,
        backend_ready: state.backend.is_initialized(),
        embedding_provider: metadata.as_ref().map(|m| m.provider.clone()),
        embedding_model: metadata.as_ref().map(|m| m.model.clone()),
        dimension: metadata.as_ref().map(|m| m.dimension),
        queue: QueueStatus {
            pending: count(retrieva_queue::JobStatus::Pending),
            running: count(retrieva_queue::JobStatus::Running),
            done: count(retrieva_queue::JobStatus::Done),
            failed: count(retrieva_queue::JobStatus::Failed),
            cancelled: count(retrieva_queue::JobStatus::Cancelled),
        },
        current_job,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::create_router;
    use crate::test_support::app_state;

    #[tokio::test]
    async fn health_reports_healthy_with_no_running_jobs() {
        let (state, _dir) = app_state();
        let router = create_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["status"], "healthy");
    }

    #[tokio::test]
    async fn status_reports_embedding_metadata_and_empty_queue_counts() {
        let (state, _dir) = app_state();
        let router = create_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["storage_kind"], "embedded");
        assert_eq!(parsed["embedding_model"], "stub");
        assert_eq!(parsed["queue"]["pending"], 0);
        assert!(parsed["current_job"].is_null());
    }
}
