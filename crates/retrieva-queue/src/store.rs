//! Durable JSONL persistence for the job queue.
//!
//! One job record per line. Writes go through a write-temp-then-rename
//! pattern guarded by an exclusive advisory lock on a sibling lock file, so
//! a crash mid-write never leaves a torn file behind.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use retrieva_common::RetrievaError;

use crate::model::Job;

/// Handle to the queue's on-disk file and its advisory lock sibling.
pub struct JsonlJobStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonlJobStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self { path, lock_path }
    }

    fn acquire_lock(&self) -> Result<File, RetrievaError> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RetrievaError::backend_unavailable(format!("creating queue directory: {e}"))
            })?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| RetrievaError::backend_unavailable(format!("opening lock file: {e}")))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| RetrievaError::backend_unavailable(format!("locking queue file: {e}")))?;
        Ok(lock_file)
    }

    /// Load every job record from disk. Returns an empty vec if the file
    /// does not exist yet.
    ///
    /// # Errors
    /// `BackendUnavailable` on I/O failure or a corrupt line.
    pub fn load(&self) -> Result<Vec<Job>, RetrievaError> {
        let lock = self.acquire_lock()?;
        let jobs = load_unlocked(&self.path);
        FileExt::unlock(&lock).ok();
        jobs
    }

    /// Overwrite the file with `jobs`, one JSON object per line, via
    /// write-temp-then-rename under the exclusive lock.
    ///
    /// # Errors
    /// `BackendUnavailable` on I/O failure.
    pub fn save_all(&self, jobs: &[Job]) -> Result<(), RetrievaError> {
        let lock = self.acquire_lock()?;
        let result = save_all_unlocked(&self.path, jobs);
        FileExt::unlock(&lock).ok();
        result
    }
}

fn load_unlocked(path: &Path) -> Result<Vec<Job>, RetrievaError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)
        .map_err(|e| RetrievaError::backend_unavailable(format!("opening queue file: {e}")))?;
    let reader = BufReader::new(file);
    let mut jobs = Vec::new();
    for line in reader.lines() {
        let line = line
            .map_err(|e| RetrievaError::backend_unavailable(format!("reading queue file: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let job: Job = serde_json::from_str(&line).map_err(|e| {
            RetrievaError::backend_unavailable(format!("parsing queue record: {e}"))
        })?;
        jobs.push(job);
    }
    Ok(jobs)
}

fn save_all_unlocked(path: &Path, jobs: &[Job]) -> Result<(), RetrievaError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            RetrievaError::backend_unavailable(format!("creating queue directory: {e}"))
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp = File::create(&tmp_path).map_err(|e| {
            RetrievaError::backend_unavailable(format!("creating queue temp file: {e}"))
        })?;
        for job in jobs {
            let line = serde_json::to_string(job).map_err(|e| {
                RetrievaError::backend_unavailable(format!("serializing job: {e}"))
            })?;
            writeln!(tmp, "{line}").map_err(|e| {
                RetrievaError::backend_unavailable(format!("writing queue temp file: {e}"))
            })?;
        }
        tmp.sync_all().map_err(|e| {
            RetrievaError::backend_unavailable(format!("flushing queue temp file: {e}"))
        })?;
    }
    std::fs::rename(&tmp_path, path)
        .map_err(|e| RetrievaError::backend_unavailable(format!("renaming queue file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkingOptions, JobRequest, Operation};

    fn sample_request() -> JobRequest {
        JobRequest {
            folder_path: "/p".to_string(),
            operation: Operation::FullIndex,
            patterns: vec![],
            chunking: ChunkingOptions {
                max_chunk_tokens: 512,
                overlap_tokens: 32,
                include_code: true,
            },
        }
    }

    #[test]
    fn round_trips_jobs_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlJobStore::new(dir.path().join("queue.jsonl"));
        let job = Job::new(sample_request());
        store.save_all(std::slice::from_ref(&job)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, job.id);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlJobStore::new(dir.path().join("queue.jsonl"));
        assert!(store.load().unwrap().is_empty());
    }
}
