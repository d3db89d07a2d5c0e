//! Centralized configuration management for retrieva
//!
//! This crate provides a unified configuration system that eliminates duplication
//! across the codebase and provides type-safe, validated configuration with
//! support for multiple sources (environment, files, CLI, etc.).
//!
//! Configuration follows a simple hierarchy:
//! 1. Safe defaults (defined as constants)
//! 2. Environment variable overrides
//! 3. Runtime validation

pub mod error;
pub mod source;
pub mod validation;

pub use error::{ConfigError, ConfigResult};

// =============================================================================
// SAFE DEFAULTS - Work for any environment (dev, staging, prod, test)
// =============================================================================

// Embedding Model Configuration
const DEFAULT_EMBEDDING_MODEL_ID: &str = "jinaai/jina-embeddings-v2-base-code";
const DEFAULT_EMBEDDING_MODEL_DIMENSIONS: usize = 768; // JinaBERT v2 standard
const DEFAULT_EMBEDDING_MODEL_MAX_CONTEXT_TOKENS: usize = 512; // Conservative for memory
const DEFAULT_EMBEDDING_MODEL_POOL_SIZE: usize = 8; // Minimum for parallelism

// Performance Configuration
const DEFAULT_EMBEDDING_INDEXER_CHUNK_BATCH_SIZE: usize = 1; // Balance memory/speed for indexing (GPU)
const DEFAULT_EMBEDDING_BATCH_TIMEOUT_MS: u64 = 1; // Low latency
const DEFAULT_EMBEDDING_USE_GPU: bool = true; // Use GPU if available

// Tokenizer / chunking configuration
const DEFAULT_TOKENIZER_CONCURRENT_FILE_LIMIT: usize = 4; // Reasonable parallelism
const DEFAULT_TOKENIZER_MAX_CHUNK_TOKENS: usize = 512; // Matches model max_tokens
const DEFAULT_TOKENIZER_SPLIT_LARGE_UNITS: bool = true; // Always split large functions
const DEFAULT_MAX_FILES_PER_DIRECTORY: usize = 10_000; // Guards against one runaway directory

// Embedded backend defaults
const DEFAULT_EMBEDDED_DATA_DIR: &str = ".retrieva/embedded";

// Relational backend defaults
const DEFAULT_RELATIONAL_HOST: &str = "localhost";
const DEFAULT_RELATIONAL_PORT: u16 = 5432;
const DEFAULT_RELATIONAL_DATABASE: &str = "retrieva";
const DEFAULT_RELATIONAL_USER: &str = "retrieva";
const DEFAULT_RELATIONAL_PASSWORD_ENV: &str = "RETRIEVA_DB_PASSWORD";
const DEFAULT_RELATIONAL_POOL_SIZE: u32 = 5;
const DEFAULT_RELATIONAL_MAX_OVERFLOW: u32 = 5;
const DEFAULT_RELATIONAL_ANN_M: u32 = 16;
const DEFAULT_RELATIONAL_ANN_EF_CONSTRUCTION: u32 = 64;
const DEFAULT_RELATIONAL_ANN_EF_SEARCH: u32 = 40;
const DEFAULT_RELATIONAL_LANGUAGE: &str = "english";

// Query defaults
const DEFAULT_QUERY_TOP_K: usize = 10;
const DEFAULT_QUERY_THRESHOLD: f32 = 0.0;
const DEFAULT_QUERY_ALPHA: f32 = 0.5;
const DEFAULT_QUERY_RRF_K: u32 = 60;

// Reranker defaults
const DEFAULT_RERANKER_ENABLED: bool = false;
const DEFAULT_RERANKER_CANDIDATE_MULTIPLIER: u32 = 4;
const DEFAULT_RERANKER_LATENCY_BUDGET_MS: u64 = 100;

// Job queue defaults
const DEFAULT_QUEUE_MAX_SIZE: usize = 1000;
const DEFAULT_QUEUE_JOB_TIMEOUT_SECONDS: u64 = 3600;
const DEFAULT_QUEUE_COMPACTION_AGE_HOURS: u64 = 24;

// API Server Configuration
const DEFAULT_API_HOST: &str = "127.0.0.1"; // Localhost only for security
const DEFAULT_API_PORT: u16 = 3000;
const DEFAULT_API_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_API_ENABLE_CORS: bool = true;
const DEFAULT_API_ENABLE_DOCS: bool = true;

// Telemetry Configuration
const DEFAULT_TELEMETRY_ENABLED: bool = false; // Opt-in
const DEFAULT_TRACING_LEVEL: &str = "info";
const DEFAULT_TRACE_SAMPLE_RATE: f64 = 0.1; // Light sampling
const DEFAULT_TELEMETRY_SERVICE_NAME: &str = "retrieva";
const DEFAULT_TELEMETRY_ENVIRONMENT: &str = "development";

/// Core configuration for the entire retrieva application
///
/// All settings have safe defaults and can be overridden via environment variables.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApplicationConfig {
    /// Storage backend selection and per-backend settings
    pub storage: StorageConfig,

    /// Embedding generation configuration
    pub embedding: EmbeddingConfig,

    /// Parsing and chunking configuration
    pub indexing: IndexingConfig,

    /// Query-time defaults for the retrieval pipeline
    pub query: QueryConfig,

    /// Optional reranking stage configuration
    pub reranker: RerankerConfig,

    /// Durable job queue configuration
    pub queue: QueueConfig,

    /// API server configuration
    pub api: ApiConfig,

    /// Telemetry and observability configuration
    pub telemetry: TelemetryConfig,
}

// =============================================================================
// STORAGE
// =============================================================================

/// Which storage backend serves the Storage Protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StorageBackend {
    /// In-process `LanceDB` + `Tantivy`, no external services required
    #[serde(rename = "embedded")]
    Embedded,

    /// `PostgreSQL` with `pgvector` and native full-text search
    #[serde(rename = "relational")]
    Relational,
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::Embedded
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "embedded" => Ok(Self::Embedded),
            "relational" => Ok(Self::Relational),
            other => Err(ConfigError::InvalidEnum {
                field: "storage.backend".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Distance metric used by the relational backend's ANN index
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DistanceMetric {
    #[serde(rename = "cosine")]
    Cosine,
    #[serde(rename = "l2")]
    L2,
    #[serde(rename = "inner_product")]
    InnerProduct,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Cosine
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" => Ok(Self::L2),
            "inner_product" => Ok(Self::InnerProduct),
            other => Err(ConfigError::InvalidEnum {
                field: "storage.relational.distance".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Storage backend selection plus per-backend settings
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub embedded: EmbeddedStorageConfig,
    pub relational: RelationalStorageConfig,
}

/// Settings for the embedded (`LanceDB` + `Tantivy`) backend
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbeddedStorageConfig {
    /// Directory holding the vector table and the keyword index
    pub data_dir: String,
}

/// ANN index tuning for `pgvector`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnnConfig {
    /// Max connections per HNSW graph node
    pub m: u32,
    /// Candidate list size while building the index
    pub ef_construction: u32,
    /// Candidate list size while searching the index
    pub ef_search: u32,
}

/// Settings for the relational (`PostgreSQL` + `pgvector`) backend
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RelationalStorageConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    /// Name of the environment variable holding the password; the password
    /// itself is never stored in configuration files.
    pub password_env: String,
    pub pool_size: u32,
    pub max_overflow: u32,
    pub ann: AnnConfig,
    /// `tsvector` stemmer configuration, e.g. "english"
    pub language: String,
    pub distance: DistanceMetric,
}

impl RelationalStorageConfig {
    /// Read the password from the environment variable named by `password_env`.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingField` if the variable is unset.
    pub fn password(&self) -> ConfigResult<String> {
        std::env::var(&self.password_env).map_err(|_| ConfigError::MissingField {
            field: self.password_env.clone(),
        })
    }
}

impl StorageConfig {
    /// Load configuration from environment variables with safe defaults.
    ///
    /// `STORAGE_BACKEND_OVERRIDE` takes precedence over any other backend
    /// selection source (configuration file included), per the documented
    /// override precedence: env var > file > default (embedded).
    pub fn from_env() -> Self {
        let backend = std::env::var("STORAGE_BACKEND_OVERRIDE")
            .ok()
            .or_else(|| std::env::var("RETRIEVA_STORAGE_BACKEND").ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let data_dir = std::env::var("RETRIEVA_STORAGE_EMBEDDED_DATA_DIR")
            .unwrap_or_else(|_| DEFAULT_EMBEDDED_DATA_DIR.to_string());

        let host = std::env::var("RETRIEVA_STORAGE_RELATIONAL_HOST")
            .unwrap_or_else(|_| DEFAULT_RELATIONAL_HOST.to_string());
        let port = std::env::var("RETRIEVA_STORAGE_RELATIONAL_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RELATIONAL_PORT);
        let database = std::env::var("RETRIEVA_STORAGE_RELATIONAL_DATABASE")
            .unwrap_or_else(|_| DEFAULT_RELATIONAL_DATABASE.to_string());
        let user = std::env::var("RETRIEVA_STORAGE_RELATIONAL_USER")
            .unwrap_or_else(|_| DEFAULT_RELATIONAL_USER.to_string());
        let password_env = std::env::var("RETRIEVA_STORAGE_RELATIONAL_PASSWORD_ENV")
            .unwrap_or_else(|_| DEFAULT_RELATIONAL_PASSWORD_ENV.to_string());
        let pool_size = std::env::var("RETRIEVA_STORAGE_RELATIONAL_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RELATIONAL_POOL_SIZE);
        let max_overflow = std::env::var("RETRIEVA_STORAGE_RELATIONAL_MAX_OVERFLOW")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RELATIONAL_MAX_OVERFLOW);
        let m = std::env::var("RETRIEVA_STORAGE_RELATIONAL_ANN_M")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RELATIONAL_ANN_M);
        let ef_construction = std::env::var("RETRIEVA_STORAGE_RELATIONAL_ANN_EF_CONSTRUCTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RELATIONAL_ANN_EF_CONSTRUCTION);
        let ef_search = std::env::var("RETRIEVA_STORAGE_RELATIONAL_ANN_EF_SEARCH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RELATIONAL_ANN_EF_SEARCH);
        let language = std::env::var("RETRIEVA_STORAGE_RELATIONAL_LANGUAGE")
            .unwrap_or_else(|_| DEFAULT_RELATIONAL_LANGUAGE.to_string());
        let distance = std::env::var("RETRIEVA_STORAGE_RELATIONAL_DISTANCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            backend,
            embedded: EmbeddedStorageConfig { data_dir },
            relational: RelationalStorageConfig {
                host,
                port,
                database,
                user,
                password_env,
                pool_size,
                max_overflow,
                ann: AnnConfig {
                    m,
                    ef_construction,
                    ef_search,
                },
                language,
                distance,
            },
        }
    }
}

impl validation::Validate for StorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.embedded.data_dir, "storage.embedded.data_dir")?;
        if self.backend == StorageBackend::Relational {
            validation::validate_non_empty(&self.relational.host, "storage.relational.host")?;
            validation::validate_port(self.relational.port, "storage.relational.port")?;
            validation::validate_non_empty(
                &self.relational.database,
                "storage.relational.database",
            )?;
            validation::validate_range(
                u64::from(self.relational.pool_size),
                1,
                1000,
                "storage.relational.pool_size",
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// EMBEDDING
// =============================================================================

/// Embedding provider type - defines where embeddings are generated
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum EmbeddingProvider {
    /// Local model provider using Candle framework with GPU acceleration
    #[serde(rename = "local")]
    Local,

    /// Remote API provider (`HuggingFace`, `OpenAI`, etc.) for cloud-based inference
    #[serde(rename = "remote")]
    Remote,
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        Self::Local
    }
}

/// Embedding generation configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider configuration (local vs remote)
    pub provider: EmbeddingProvider,

    /// Model identifier (e.g., "jinaai/jina-embeddings-v2-base-code")
    pub model: String,

    /// Embedding dimensions produced by this model; must match what is
    /// already stored in an initialized backend.
    pub dimension: usize,

    /// Maximum tokens the model can process in a single input
    pub max_tokens: usize,

    /// Number of embedding model instances in the pool
    pub pool_size: usize,

    /// Maximum milliseconds to wait when collecting requests into a batch
    pub batch_timeout_ms: u64,

    /// Whether to use GPU acceleration if available (Metal/CUDA)
    pub use_gpu: bool,

    /// Specific GPU device to use (e.g., "cuda:0", "mps", "metal")
    pub gpu_device: Option<String>,

    /// Cache directory for downloaded models
    pub cache_dir: Option<String>,
}

impl EmbeddingConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let provider = std::env::var("RETRIEVA_EMBEDDING_PROVIDER")
            .ok()
            .and_then(|s| match s.as_str() {
                "local" => Some(EmbeddingProvider::Local),
                "remote" => Some(EmbeddingProvider::Remote),
                _ => None,
            })
            .unwrap_or_default();

        let model = std::env::var("RETRIEVA_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL_ID.to_string());

        let max_tokens = std::env::var("RETRIEVA_EMBEDDING_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_MODEL_MAX_CONTEXT_TOKENS);

        let dimension = std::env::var("RETRIEVA_EMBEDDING_DIMENSION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_MODEL_DIMENSIONS);

        let pool_size = std::env::var("RETRIEVA_EMBEDDING_MODEL_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_MODEL_POOL_SIZE);

        let batch_timeout_ms = std::env::var("RETRIEVA_EMBEDDING_BATCH_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_BATCH_TIMEOUT_MS);

        let use_gpu = std::env::var("RETRIEVA_EMBEDDING_USE_GPU")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_USE_GPU);

        let gpu_device = std::env::var("RETRIEVA_EMBEDDING_GPU_DEVICE").ok();

        let cache_dir = std::env::var("RETRIEVA_EMBEDDING_CACHE_DIR").ok().or_else(|| {
            Some(
                dirs::cache_dir()
                    .unwrap_or_else(|| std::path::PathBuf::from(".cache"))
                    .join("retrieva")
                    .to_string_lossy()
                    .to_string(),
            )
        });

        Self {
            provider,
            model,
            dimension,
            max_tokens,
            pool_size,
            batch_timeout_ms,
            use_gpu,
            gpu_device,
            cache_dir,
        }
    }
}

impl validation::Validate for EmbeddingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.model, "embedding.model")?;
        validation::validate_range(self.max_tokens as u64, 1, 100_000, "embedding.max_tokens")?;
        validation::validate_range(self.dimension as u64, 1, 10_000, "embedding.dimension")?;
        validation::validate_range(self.pool_size as u64, 1, 64, "embedding.pool_size")?;
        Ok(())
    }
}

// =============================================================================
// INDEXING / PARSING
// =============================================================================

/// Parsing and chunking configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexingConfig {
    /// Maximum chunk size in tokens
    pub max_chunk_tokens: usize,

    /// Whether to split large code units
    pub split_large_units: bool,

    /// Number of concurrent file-parsing tasks
    pub concurrency_limit: usize,

    /// Batch size used when sending chunks to the embedding provider
    pub embedding_batch_size: usize,

    /// Enumeration stops descending into a directory once it has yielded
    /// this many files, so one enormous directory can't stall a job.
    pub max_files_per_directory: usize,
}

impl IndexingConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let max_chunk_tokens = std::env::var("RETRIEVA_INDEXING_MAX_CHUNK_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOKENIZER_MAX_CHUNK_TOKENS);

        let split_large_units = std::env::var("RETRIEVA_INDEXING_SPLIT_LARGE_UNITS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOKENIZER_SPLIT_LARGE_UNITS);

        let concurrency_limit = std::env::var("RETRIEVA_INDEXING_CONCURRENCY_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOKENIZER_CONCURRENT_FILE_LIMIT);

        let embedding_batch_size = std::env::var("RETRIEVA_INDEXING_EMBEDDING_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBEDDING_INDEXER_CHUNK_BATCH_SIZE);

        let max_files_per_directory = std::env::var("RETRIEVA_INDEXING_MAX_FILES_PER_DIRECTORY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_FILES_PER_DIRECTORY);

        Self {
            max_chunk_tokens,
            split_large_units,
            concurrency_limit,
            embedding_batch_size,
            max_files_per_directory,
        }
    }
}

impl validation::Validate for IndexingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(
            self.max_chunk_tokens as u64,
            1,
            10_000,
            "indexing.max_chunk_tokens",
        )?;
        validation::validate_range(
            self.concurrency_limit as u64,
            1,
            100,
            "indexing.concurrency_limit",
        )?;
        validation::validate_range(
            self.max_files_per_directory as u64,
            1,
            1_000_000,
            "indexing.max_files_per_directory",
        )?;
        Ok(())
    }
}

// =============================================================================
// QUERY + RERANKER
// =============================================================================

/// Query-time defaults applied when a request does not specify them
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryConfig {
    pub defaults: QueryDefaults,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueryDefaults {
    /// Number of results returned when a request omits `top_k`
    pub top_k: usize,
    /// Minimum fused score a result must clear to be returned
    pub threshold: f32,
    /// Weight given to the vector signal in hybrid mode; `1 - alpha` goes to keyword
    pub alpha: f32,
    /// RRF constant `K`
    pub rrf_k: u32,
}

impl QueryConfig {
    pub fn from_env() -> Self {
        let top_k = std::env::var("RETRIEVA_QUERY_TOP_K")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUERY_TOP_K);
        let threshold = std::env::var("RETRIEVA_QUERY_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUERY_THRESHOLD);
        let alpha = std::env::var("RETRIEVA_QUERY_ALPHA")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUERY_ALPHA);
        let rrf_k = std::env::var("RETRIEVA_QUERY_RRF_K")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUERY_RRF_K);

        Self {
            defaults: QueryDefaults {
                top_k,
                threshold,
                alpha,
                rrf_k,
            },
        }
    }
}

impl validation::Validate for QueryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.defaults.top_k as u64, 1, 1000, "query.defaults.top_k")?;
        if !(0.0..=1.0).contains(&self.defaults.alpha) {
            return Err(ConfigError::OutOfRange {
                field: "query.defaults.alpha".to_string(),
                value: (self.defaults.alpha * 1000.0) as u64,
                min: 0,
                max: 1000,
            });
        }
        Ok(())
    }
}

/// Optional second-stage reranking configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RerankerConfig {
    pub enabled: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Rerank `alpha * candidate_multiplier` candidates beyond `top_k`
    pub candidate_multiplier: u32,
    /// Hard cancel: fall back to pre-rerank fused results past this budget
    pub latency_budget_ms: u64,
}

impl RerankerConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("RETRIEVA_RERANKER_ENABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RERANKER_ENABLED);
        let provider = std::env::var("RETRIEVA_RERANKER_PROVIDER").ok();
        let model = std::env::var("RETRIEVA_RERANKER_MODEL").ok();
        let candidate_multiplier = std::env::var("RETRIEVA_RERANKER_CANDIDATE_MULTIPLIER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RERANKER_CANDIDATE_MULTIPLIER);
        let latency_budget_ms = std::env::var("RETRIEVA_RERANKER_LATENCY_BUDGET_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RERANKER_LATENCY_BUDGET_MS);

        Self {
            enabled,
            provider,
            model,
            candidate_multiplier,
            latency_budget_ms,
        }
    }
}

impl validation::Validate for RerankerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.enabled && self.provider.is_none() {
            return Err(ConfigError::MissingField {
                field: "reranker.provider".to_string(),
            });
        }
        validation::validate_range(
            u64::from(self.candidate_multiplier),
            1,
            64,
            "reranker.candidate_multiplier",
        )?;
        Ok(())
    }
}

// =============================================================================
// QUEUE
// =============================================================================

/// Durable job queue configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueueConfig {
    /// Maximum number of jobs tracked at once; new submissions past this
    /// return `QueueFull`.
    pub max_size: usize,
    /// A running job past this age is treated as crashed on recovery.
    pub job_timeout_seconds: u64,
    /// Terminal jobs older than this are dropped from the queue file.
    pub compaction_age_hours: u64,
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let max_size = std::env::var("RETRIEVA_QUEUE_MAX_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUEUE_MAX_SIZE);
        let job_timeout_seconds = std::env::var("RETRIEVA_QUEUE_JOB_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUEUE_JOB_TIMEOUT_SECONDS);
        let compaction_age_hours = std::env::var("RETRIEVA_QUEUE_COMPACTION_AGE_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUEUE_COMPACTION_AGE_HOURS);

        Self {
            max_size,
            job_timeout_seconds,
            compaction_age_hours,
        }
    }
}

impl validation::Validate for QueueConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(self.max_size as u64, 1, 1_000_000, "queue.max_size")?;
        validation::validate_range(
            self.job_timeout_seconds,
            1,
            86_400,
            "queue.job_timeout_seconds",
        )?;
        Ok(())
    }
}

// =============================================================================
// API + TELEMETRY
// =============================================================================

/// API server configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
    pub enable_cors: bool,
    pub enable_docs: bool,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let host =
            std::env::var("RETRIEVA_API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());

        let port = std::env::var("RETRIEVA_API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_PORT);

        let timeout_seconds = std::env::var("RETRIEVA_API_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECONDS);

        let enable_cors = std::env::var("RETRIEVA_API_ENABLE_CORS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_ENABLE_CORS);

        let enable_docs = std::env::var("RETRIEVA_API_ENABLE_DOCS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_ENABLE_DOCS);

        Self {
            host,
            port,
            timeout_seconds,
            enable_cors,
            enable_docs,
        }
    }
}

impl validation::Validate for ApiConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.host, "api.host")?;
        if self.port != 0 {
            validation::validate_port(self.port, "api.port")?;
        }
        validation::validate_range(self.timeout_seconds, 1, 3600, "api.timeout_seconds")?;
        Ok(())
    }
}

/// Telemetry and observability configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub otlp_endpoint: Option<String>,
    pub tracing_level: String,
    pub enable_metrics: bool,
    pub metrics_port: u16,
    pub trace_sample_rate: f64,
    pub service_name: String,
    pub environment: String,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("RETRIEVA_TELEMETRY_ENABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TELEMETRY_ENABLED);

        let otlp_endpoint = std::env::var("RETRIEVA_TELEMETRY_OTLP_ENDPOINT").ok();

        let tracing_level = std::env::var("RETRIEVA_TELEMETRY_TRACING_LEVEL")
            .unwrap_or_else(|_| DEFAULT_TRACING_LEVEL.to_string());

        let enable_metrics = std::env::var("RETRIEVA_TELEMETRY_ENABLE_METRICS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TELEMETRY_ENABLED);

        let metrics_port = std::env::var("RETRIEVA_TELEMETRY_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0); // Random port by default

        let trace_sample_rate = std::env::var("RETRIEVA_TELEMETRY_TRACE_SAMPLE_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TRACE_SAMPLE_RATE);

        let service_name = std::env::var("RETRIEVA_TELEMETRY_SERVICE_NAME")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_SERVICE_NAME.to_string());

        let environment = std::env::var("RETRIEVA_TELEMETRY_ENVIRONMENT")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_ENVIRONMENT.to_string());

        Self {
            enabled,
            otlp_endpoint,
            tracing_level,
            enable_metrics,
            metrics_port,
            trace_sample_rate,
            service_name,
            environment,
        }
    }
}

impl validation::Validate for TelemetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.service_name, "telemetry.service_name")?;
        validation::validate_non_empty(&self.environment, "telemetry.environment")?;

        if let Some(ref endpoint) = self.otlp_endpoint {
            validation::validate_url(endpoint, "telemetry.otlp_endpoint")?;
        }

        if self.metrics_port != 0 {
            validation::validate_port(self.metrics_port, "telemetry.metrics_port")?;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sample_rate_scaled = (self.trace_sample_rate * 1000.0) as u64;
        validation::validate_range(sample_rate_scaled, 0, 1000, "telemetry.trace_sample_rate")?;

        match self.tracing_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::InvalidEnum {
                field: "telemetry.tracing_level".to_string(),
                value: self.tracing_level.clone(),
            }),
        }
    }
}

impl ApplicationConfig {
    /// Load configuration from environment variables with safe defaults
    ///
    /// All configuration is loaded from environment variables or falls back
    /// to safe defaults that work in any environment (dev, staging, prod, test).
    pub fn from_env() -> Self {
        Self {
            storage: StorageConfig::from_env(),
            embedding: EmbeddingConfig::from_env(),
            indexing: IndexingConfig::from_env(),
            query: QueryConfig::from_env(),
            reranker: RerankerConfig::from_env(),
            queue: QueueConfig::from_env(),
            api: ApiConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
        }
    }
}

impl validation::Validate for ApplicationConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.storage.validate()?;
        self.embedding.validate()?;
        self.indexing.validate()?;
        self.query.validate()?;
        self.reranker.validate()?;
        self.queue.validate()?;
        self.api.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn test_application_config_can_be_created() {
        let config = ApplicationConfig::from_env();
        assert!(config.embedding.model.contains("jina"));
        assert_eq!(
            config.embedding.max_tokens,
            DEFAULT_EMBEDDING_MODEL_MAX_CONTEXT_TOKENS
        );
        assert_eq!(config.storage.backend, StorageBackend::Embedded);
    }

    #[test]
    fn storage_backend_override_wins_over_file_default() {
        // SAFETY-sensitive only in that this mutates process env; tests that
        // touch STORAGE_BACKEND_OVERRIDE must not run concurrently with ones
        // that read it, which holds today since no other test sets it.
        unsafe {
            std::env::set_var("STORAGE_BACKEND_OVERRIDE", "relational");
        }
        let storage = StorageConfig::from_env();
        assert_eq!(storage.backend, StorageBackend::Relational);
        unsafe {
            std::env::remove_var("STORAGE_BACKEND_OVERRIDE");
        }
    }

    #[test]
    fn test_config_validation_rejects_bad_alpha() {
        let mut config = ApplicationConfig::from_env();
        config.query.defaults.alpha = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reranker_enabled_without_provider_is_rejected() {
        let mut config = ApplicationConfig::from_env();
        config.reranker.enabled = true;
        config.reranker.provider = None;
        assert!(config.validate().is_err());
    }
}
