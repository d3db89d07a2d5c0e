//! Health reporting shared by both backends.

/// Which concrete backend is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Embedded,
    Relational,
}

/// Connection pool statistics, populated only by the relational backend.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PoolStats {
    pub size: u32,
    pub in_use: u32,
    pub checked_out_peak: u32,
    pub last_ping_ms: Option<f64>,
}

/// A snapshot of backend readiness, reported through `GET /health/status`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BackendHealth {
    pub kind: StorageKind,
    pub ready: bool,
    pub pool: Option<PoolStats>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
    pub dimension: Option<usize>,
}
