//! Schema migrations for the relational backend, embedded at compile time.

use retrieva_common::RetrievaError;
use sqlx::PgPool;

/// Apply every migration under `migrations/` that has not yet run against
/// `pool`. Idempotent: safe to call on every process start.
///
/// # Errors
/// `BackendUnavailable` if a migration fails or the migrations table can't
/// be read.
pub async fn run_migrations(pool: &PgPool) -> Result<(), RetrievaError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| RetrievaError::backend_unavailable(format!("migration failed: {e}")))
}
