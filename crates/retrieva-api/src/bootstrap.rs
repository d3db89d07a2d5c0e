//! Application bootstrap and service initialization.
//!
//! Composes configuration, the active storage backend, the embedding
//! provider, the retrieval pipeline, and the job queue + worker into one
//! [`AppState`]. This is the only module in the workspace that depends on
//! both storage backend crates, matching the Backend Factory's contract.

use std::sync::Arc;
use std::time::Duration;

use retrieva_common::RetrievaError;
use retrieva_config::source::ConfigurationLoader;
use retrieva_config::{ApplicationConfig, StorageBackend as StorageBackendKind};
use retrieva_embeddings::{DefaultEmbeddingProvider, EmbeddingProvider};
use retrieva_indexing::IndexingPipeline;
use retrieva_queue::{JobQueue, Worker};
use retrieva_search::SearchPipeline;
use retrieva_storage::{BackendFactory, EmbeddingMetadata, StorageBackend};
use retrieva_storage_embedded::EmbeddedBackend;
use retrieva_storage_relational::RelationalBackend;
use tracing::info;

use crate::state::AppState;

pub type BootstrapResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load and validate configuration from the environment, optionally
/// layered with a TOML file named by `RETRIEVA_CONFIG_FILE`.
///
/// # Errors
/// Returns `ConfigurationError` if any section fails validation; this is
/// fatal and must abort startup per the error taxonomy.
pub fn load_config() -> Result<ApplicationConfig, retrieva_config::ConfigError> {
    let mut loader = ConfigurationLoader::new();
    if let Ok(path) = std::env::var("RETRIEVA_CONFIG_FILE") {
        loader = loader.add_source(Box::new(retrieva_config::source::TomlFileSource::new(path)));
    }
    loader.load()
}

/// Construct (or reuse, via the factory) the active storage backend for
/// `config.storage.backend`.
///
/// # Errors
/// `ConfigurationError` on an unsupported backend selection or a
/// dimension mismatch between the configured provider and stored data.
pub async fn build_backend(
    factory: &BackendFactory,
    config: &ApplicationConfig,
) -> Result<Arc<dyn StorageBackend>, RetrievaError> {
    let expected = EmbeddingMetadata {
        provider: format!("{:?}", config.embedding.provider).to_lowercase(),
        model: config.embedding.model.clone(),
        dimension: config.embedding.dimension,
    };
    let storage = config.storage.clone();

    factory
        .get_or_init(move || async move {
            let backend: Arc<dyn StorageBackend> = match storage.backend {
                StorageBackendKind::Embedded => Arc::new(
                    EmbeddedBackend::open(storage.embedded.data_dir.clone(), expected).await?,
                ),
                StorageBackendKind::Relational => {
                    Arc::new(RelationalBackend::connect(&storage.relational, expected).await?)
                }
            };
            backend.initialize().await?;
            Ok(backend)
        })
        .await
}

/// Initialize all services and assemble application state.
///
/// # Errors
/// Returns an error if backend initialization, the job queue file, or the
/// embedding provider warm-up fails.
pub async fn initialize_app_state(config: &ApplicationConfig) -> BootstrapResult<AppState> {
    let factory = BackendFactory::new();
    let backend = build_backend(&factory, config).await?;

    let embeddings = Arc::new(DefaultEmbeddingProvider::new(config.embedding.clone()));
    info!("warming up embedding provider (downloading model if needed)...");
    embeddings.ensure_ready().await?;
    info!("embedding provider ready");

    let embeddings: Arc<dyn EmbeddingProvider> = embeddings;
    let search = Arc::new(SearchPipeline::new(
        Arc::clone(&backend),
        Arc::clone(&embeddings),
        None,
        None,
        config.query.defaults.clone(),
        config.reranker.clone(),
    ));

    let queue_path = std::env::var("RETRIEVA_QUEUE_FILE")
        .unwrap_or_else(|_| ".retrieva/jobs.jsonl".to_string());
    let queue = Arc::new(JobQueue::load(
        queue_path,
        config.queue.max_size,
        config.queue.compaction_age_hours,
    )?);

    let pipeline = Arc::new(IndexingPipeline::new(
        Arc::clone(&backend),
        Arc::clone(&embeddings),
        config.indexing.clone(),
    ));

    let worker = Worker::new(
        Arc::clone(&queue),
        pipeline as Arc<dyn retrieva_queue::IndexingDriver>,
        Duration::from_secs(config.queue.job_timeout_seconds),
    );
    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move { worker.run(shutdown_rx).await });

    let storage_kind = match config.storage.backend {
        StorageBackendKind::Embedded => retrieva_storage::StorageKind::Embedded,
        StorageBackendKind::Relational => retrieva_storage::StorageKind::Relational,
    };

    info!("application state initialized");
    Ok(AppState {
        backend,
        storage_kind,
        embeddings,
        search,
        queue,
    })
}

/// Write the runtime discovery file external CLI clients poll for,
/// containing the base URL, port, active storage mode, and a fresh
/// instance id. Written before the listener starts accepting connections.
///
/// # Errors
/// Returns an I/O error if the file cannot be written.
pub fn write_discovery_file(config: &ApplicationConfig) -> std::io::Result<()> {
    let path = std::env::var("RETRIEVA_DISCOVERY_FILE")
        .unwrap_or_else(|_| ".retrieva/instance.json".to_string());
    if let Some(parent) = std::path::Path::new(&path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let payload = serde_json::json!({
        "base_url": format!("http://{}:{}", config.api.host, config.api.port),
        "port": config.api.port,
        "mode": format!("{:?}", config.storage.backend).to_lowercase(),
        "instance_id": uuid::Uuid::new_v4().to_string(),
    });
    std::fs::write(path, serde_json::to_vec_pretty(&payload)?)
}
