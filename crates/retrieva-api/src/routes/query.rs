//! The retrieval entry point: `POST /query`.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use retrieva_search::{QueryMode, QueryParams};
use retrieva_storage::model::{Filter, SearchResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/query", post(query))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QueryRequest {
    text: String,
    #[serde(default = "default_mode")]
    #[schema(value_type = String)]
    mode: QueryMode,
    top_k: Option<usize>,
    similarity_threshold: Option<f32>,
    rrf_k: Option<u32>,
    alpha: Option<f32>,
    #[serde(default)]
    #[schema(value_type = Object)]
    filter: Filter,
    traversal_depth: Option<u32>,
}

const fn default_mode() -> QueryMode {
    QueryMode::Hybrid
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResponse {
    #[schema(value_type = Vec<Object>)]
    results: Vec<SearchResult>,
    warnings: Vec<String>,
}

/// Run a retrieval query against the active backend.
#[utoipa::path(
    post,
    path = "/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Ordered results with per-signal scores", body = QueryResponse),
        (status = 400, description = "Empty query text"),
        (status = 503, description = "Indexing in progress and index empty")
    ),
    tag = "query"
)]
async fn query(
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let params = QueryParams {
        top_k: body.top_k,
        similarity_threshold: body.similarity_threshold,
        rrf_k: body.rrf_k,
        alpha: body.alpha,
        filter: body.filter,
        traversal_depth: body.traversal_depth,
    };

    let response = state.search.query(&body.text, body.mode, params).await?;

    Ok(Json(QueryResponse {
        results: response.results,
        warnings: response.warnings,
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
    async fn query_against_an_empty_index_returns_no_results() {
        let (state, _dir) = app_state();
        let router = create_router(state);

        let body = serde_json::json!({ "text": "fn parse_document" }).to_string();
        let request = Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_text_field_is_rejected_with_a_client_error() {
        let (state, _dir) = app_state();
        let router = create_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
