//! Conversions from the embedded backend's dependencies into the shared
//! error taxonomy.

use retrieva_common::RetrievaError;

pub fn from_lance(err: lancedb::Error) -> RetrievaError {
    RetrievaError::backend_unavailable(format!("lancedb: {err}"))
}

pub fn from_arrow(err: arrow_schema::ArrowError) -> RetrievaError {
    RetrievaError::backend_unavailable(format!("arrow: {err}"))
}

pub fn from_tantivy(err: tantivy::TantivyError) -> RetrievaError {
    RetrievaError::backend_unavailable(format!("tantivy: {err}"))
}

pub fn from_query_parser(err: tantivy::query::QueryParserError) -> RetrievaError {
    RetrievaError::invalid_input(format!("keyword query: {err}"))
}
