//! Translates `sqlx`/Postgres failures into the closed `RetrievaError` taxonomy.

use retrieva_common::RetrievaError;

#[must_use]
pub fn from_sqlx(err: sqlx::Error) -> RetrievaError {
    match err {
        sqlx::Error::RowNotFound => RetrievaError::not_found("row not found"),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            RetrievaError::invalid_input(format!("could not decode row: {err}"))
        }
        other => RetrievaError::backend_unavailable(format!("postgres error: {other}")),
    }
}
