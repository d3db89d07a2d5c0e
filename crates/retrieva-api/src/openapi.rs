//! `OpenAPI` documentation generation and Swagger UI setup.

use axum::response::IntoResponse;
use axum::Json;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::index::submit_full,
        crate::routes::index::job_detail,
        crate::routes::query::query,
    ),
    components(schemas(
        crate::routes::index::SubmitRequest,
        crate::routes::index::SubmitResponse,
        crate::routes::index::JobDetail,
        crate::routes::query::QueryRequest,
        crate::routes::query::QueryResponse,
    )),
    tags(
        (name = "index", description = "Indexing job submission and lifecycle"),
        (name = "query", description = "Retrieval queries"),
    ),
    info(
        title = "Retrieva API",
        version = "0.2.0",
        description = "Semantic code search and indexing service",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

/// Returns configured Swagger UI service
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

/// Returns `OpenAPI` JSON as a response
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
