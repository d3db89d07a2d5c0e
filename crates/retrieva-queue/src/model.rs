//! The job record and its request parameters.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The requested indexing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    FullIndex,
    Add,
}

/// Chunking parameters a submission can override.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChunkingOptions {
    pub max_chunk_tokens: usize,
    pub overlap_tokens: usize,
    pub include_code: bool,
}

/// The parameters of a submitted indexing request.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobRequest {
    pub folder_path: String,
    pub operation: Operation,
    pub patterns: Vec<String>,
    pub chunking: ChunkingOptions,
}

impl JobRequest {
    /// A stable hash over the normalized request parameters, used to
    /// detect a resubmission of the same work while it is still in flight.
    #[must_use]
    pub fn dedupe_key(&self) -> String {
        let mut patterns = self.patterns.clone();
        patterns.sort_unstable();
        let normalized = format!(
            "{}|{:?}|{}|{}|{}|{}",
            self.folder_path,
            self.operation,
            patterns.join(","),
            self.chunking.max_chunk_tokens,
            self.chunking.overlap_tokens,
            self.chunking.include_code,
        );
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Where a job is in its lifecycle.
///
/// Transitions: `pending -> running -> {done, failed, cancelled}` and
/// `pending -> cancelled`. A job in a terminal state (`done`, `failed`,
/// `cancelled`) is never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Progress counters forwarded from the indexing pipeline.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct JobProgress {
    pub files_processed: u64,
    pub files_total: u64,
    pub chunks_created: u64,
    pub current_file: Option<String>,
}

/// A queued indexing request and everything the worker has observed about
/// its execution so far.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub dedupe_key: String,
    pub request: JobRequest,
    pub status: JobStatus,
    pub cancel_requested: bool,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: JobProgress,
    pub error: Option<String>,
    pub total_documents: u64,
    pub total_chunks: u64,
}

impl Job {
    #[must_use]
    pub fn new(request: JobRequest) -> Self {
        let dedupe_key = request.dedupe_key();
        Self {
            id: Uuid::new_v4(),
            dedupe_key,
            request,
            status: JobStatus::Pending,
            cancel_requested: false,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            progress: JobProgress::default(),
            error: None,
            total_documents: 0,
            total_chunks: 0,
        }
    }
}
