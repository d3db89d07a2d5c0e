//! Indexing job routes: submit, list, inspect, cancel, and reset.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use retrieva_common::RetrievaError;
use retrieva_queue::{ChunkingOptions, Job, JobProgress, JobRequest, JobStatus, Operation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/index", post(submit_full).delete(reset))
        .route("/index/add", post(submit_add))
        .route("/index/jobs", get(list_jobs))
        .route("/index/jobs/{id}", get(job_detail).delete(cancel_job))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    folder_path: String,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default = "default_max_chunk_tokens")]
    max_chunk_tokens: usize,
    #[serde(default)]
    overlap_tokens: usize,
    #[serde(default = "default_true")]
    include_code: bool,
}

const fn default_max_chunk_tokens() -> usize {
    512
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    job_id: Uuid,
    queue_position: usize,
    queue_length: usize,
    dedupe_hit: bool,
}

async fn submit(state: &AppState, body: SubmitRequest, operation: Operation) -> Result<(StatusCode, Json<SubmitResponse>)> {
    if body.folder_path.trim().is_empty() {
        return Err(RetrievaError::invalid_input("folder_path must not be empty").into());
    }

    let request = JobRequest {
        folder_path: body.folder_path,
        operation,
        patterns: body.patterns,
        chunking: ChunkingOptions {
            max_chunk_tokens: body.max_chunk_tokens,
            overlap_tokens: body.overlap_tokens,
            include_code: body.include_code,
        },
    };

    let submission = state.queue.submit(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: submission.job.id,
            queue_position: submission.queue_position,
            queue_length: submission.queue_length,
            dedupe_hit: submission.dedupe_hit,
        }),
    ))
}

/// Enqueue full-folder indexing.
#[utoipa::path(
    post,
    path = "/index",
    request_body = SubmitRequest,
    responses((status = 202, description = "Job accepted", body = SubmitResponse)),
    tag = "index"
)]
async fn submit_full(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    submit(&state, body, Operation::FullIndex).await
}

async fn submit_add(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    submit(&state, body, Operation::Add).await
}

#[derive(Debug, Deserialize)]
struct ListJobsQuery {
    status: Option<JobStatus>,
}

#[derive(Debug, Serialize)]
struct JobSummary {
    id: Uuid,
    status: JobStatus,
    folder_path: String,
    enqueued_at: chrono::DateTime<chrono::Utc>,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Json<Vec<JobSummary>> {
    let jobs = state.queue.list(query.status).await;
    Json(jobs.iter().map(summarize).collect())
}

fn summarize(job: &Job) -> JobSummary {
    JobSummary {
        id: job.id,
        status: job.status,
        folder_path: job.request.folder_path.clone(),
        enqueued_at: job.enqueued_at,
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobDetail {
    id: Uuid,
    #[schema(value_type = String)]
    status: JobStatus,
    folder_path: String,
    #[schema(value_type = Object)]
    progress: JobProgress,
    error: Option<String>,
    total_documents: u64,
    total_chunks: u64,
}

/// Fetch a job's current status and progress.
#[utoipa::path(
    get,
    path = "/index/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job detail", body = JobDetail),
        (status = 404, description = "Unknown job id")
    ),
    tag = "index"
)]
async fn job_detail(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<JobDetail>> {
    let job = state
        .queue
        .get(id)
        .await
        .ok_or_else(|| RetrievaError::not_found(format!("job {id}")))?;

    Ok(Json(JobDetail {
        id: job.id,
        status: job.status,
        folder_path: job.request.folder_path,
        progress: job.progress,
        error: job.error,
        total_documents: job.total_documents,
        total_chunks: job.total_chunks,
    }))
}

async fn cancel_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<JobSummary>> {
    let job = state.queue.cancel(id).await?;
    Ok(Json(summarize(&job)))
}

async fn reset(State(state): State<AppState>) -> Result<StatusCode> {
    state.backend.reset().await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::create_router;
    use crate::test_support::app_state;

    #[tokio::test]
    async fn submitting_a_job_returns_202_and_can_be_fetched_by_id() {
        let (state, _dir) = app_state();
        let router = create_router(state);

        let body = serde_json::json!({ "folder_path": "/repo" }).to_string();
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/index")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let submitted: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let job_id = submitted["job_id"].as_str().unwrap();

        let detail_response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/index/jobs/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(detail_response.status(), StatusCode::OK);

        let bytes = to_bytes(detail_response.into_body(), usize::MAX).await.unwrap();
        let detail: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(detail["folder_path"], "/repo");
        assert_eq!(detail["status"], "pending");
    }

    #[tokio::test]
    async fn empty_folder_path_is_rejected() {
        let (state, _dir) = app_state();
        let router = create_router(state);

        let body = serde_json::json!({ "folder_path" : "  " }).to_string();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/index")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancelling_an_unknown_job_returns_404() {
        let (state, _dir) = app_state();
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/index/jobs/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
