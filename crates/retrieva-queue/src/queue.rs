//! In-memory cache over the durable store, with submit/cancel/list and
//! the backpressure and deduplication rules from the job queue design.

use std::sync::Arc;

use chrono::Utc;
use retrieva_common::RetrievaError;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::model::{Job, JobRequest, JobStatus};
use crate::store::JsonlJobStore;

/// Result of a submission: either a freshly enqueued job or a hit against
/// an already in-flight job with the same dedupe key.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job: Job,
    pub dedupe_hit: bool,
    pub queue_position: usize,
    pub queue_length: usize,
}

struct Inner {
    jobs: Vec<Job>,
}

/// The durable, single-concurrency job queue.
pub struct JobQueue {
    store: JsonlJobStore,
    inner: Mutex<Inner>,
    notify: Arc<Notify>,
    max_size: usize,
    compaction_age_hours: u64,
}

impl JobQueue {
    /// Load the queue file, performing crash recovery: any `running` job
    /// is reset to `pending`, and terminal jobs older than
    /// `compaction_age_hours` are dropped.
    ///
    /// # Errors
    /// `BackendUnavailable` if the queue file exists but cannot be read.
    pub fn load(
        path: impl Into<std::path::PathBuf>,
        max_size: usize,
        compaction_age_hours: u64,
    ) -> Result<Self, RetrievaError> {
        let store = JsonlJobStore::new(path);
        let mut jobs = store.load()?;

        for job in &mut jobs {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Pending;
                job.started_at = None;
            }
        }

        let cutoff = Utc::now() - chrono::Duration::hours(i64::try_from(compaction_age_hours).unwrap_or(i64::MAX));
        jobs.retain(|job| {
            !job.status.is_terminal() || job.finished_at.is_none_or(|finished| finished >= cutoff)
        });

        store.save_all(&jobs)?;

        Ok(Self {
            store,
            inner: Mutex::new(Inner { jobs }),
            notify: Arc::new(Notify::new()),
            max_size,
            compaction_age_hours,
        })
    }

    /// A clone of the handle used to wake the worker on new submissions.
    #[must_use]
    pub fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    /// Submit a new indexing request.
    ///
    /// # Errors
    /// `QueueFull` if the queue is at `max_size` and no existing job
    /// shares `request`'s dedupe key.
    pub async fn submit(&self, request: JobRequest) -> Result<Submission, RetrievaError> {
        let dedupe_key = request.dedupe_key();
        let mut guard = self.inner.lock().await;

        if let Some(existing) = guard
            .jobs
            .iter()
            .find(|j| j.dedupe_key == dedupe_key && !j.status.is_terminal())
        {
            let queue_length = guard.jobs.len();
            return Ok(Submission {
                job: existing.clone(),
                dedupe_hit: true,
                queue_position: guard
                    .jobs
                    .iter()
                    .position(|j| j.id == existing.id)
                    .unwrap_or(0),
                queue_length,
            });
        }

        if guard.jobs.len() >= self.max_size {
            return Err(RetrievaError::QueueFull);
        }

        let job = Job::new(request);
        guard.jobs.push(job.clone());
        self.store.save_all(&guard.jobs)?;
        let queue_position = guard.jobs.len().saturating_sub(1);
        let queue_length = guard.jobs.len();
        drop(guard);

        self.notify.notify_one();

        Ok(Submission {
            job,
            dedupe_hit: false,
            queue_position,
            queue_length,
        })
    }

    /// # Errors
    /// `BackendUnavailable` on persistence failure.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        let guard = self.inner.lock().await;
        guard
            .jobs
            .iter()
            .filter(|j| status.is_none_or(|s| j.status == s))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        let guard = self.inner.lock().await;
        guard.jobs.iter().find(|j| j.id == id).cloned()
    }

    /// Cancel a job. A pending job is transitioned to `cancelled`
    /// immediately; a running job has its cancel-requested flag set and is
    /// transitioned by the worker at the next batch boundary.
    ///
    /// # Errors
    /// `NotFound` if `id` is unknown, `Conflict` if the job is already
    /// terminal.
    pub async fn cancel(&self, id: Uuid) -> Result<Job, RetrievaError> {
        let mut guard = self.inner.lock().await;
        let job = guard
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| RetrievaError::not_found(format!("job {id}")))?;

        if job.status.is_terminal() {
            return Err(RetrievaError::conflict(format!(
                "job {id} is already {:?}",
                job.status
            )));
        }

        if job.status == JobStatus::Pending {
            job.status = JobStatus::Cancelled;
            job.finished_at = Some(Utc::now());
        } else {
            job.cancel_requested = true;
        }
        let updated = job.clone();
        self.store.save_all(&guard.jobs)?;
        Ok(updated)
    }

    /// Persist the current in-memory state and hand back the oldest
    /// `pending` job, if any, marking it `running`.
    pub(crate) async fn take_next_pending(&self) -> Option<Job> {
        let mut guard = self.inner.lock().await;
        let idx = guard.jobs.iter().position(|j| j.status == JobStatus::Pending)?;
        let job = &mut guard.jobs[idx];
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        let snapshot = job.clone();
        self.store.save_all(&guard.jobs).ok()?;
        Some(snapshot)
    }

    pub(crate) async fn update(&self, id: Uuid, f: impl FnOnce(&mut Job)) {
        let mut guard = self.inner.lock().await;
        if let Some(job) = guard.jobs.iter_mut().find(|j| j.id == id) {
            f(job);
        }
        let _ = self.store.save_all(&guard.jobs);
    }

    pub(crate) async fn is_cancel_requested(&self, id: Uuid) -> bool {
        let guard = self.inner.lock().await;
        guard
            .jobs
            .iter()
            .find(|j| j.id == id)
            .is_some_and(|j| j.cancel_requested)
    }

    #[must_use]
    pub const fn compaction_age_hours(&self) -> u64 {
        self.compaction_age_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkingOptions, Operation};

    fn sample_request(path: &str) -> JobRequest {
        JobRequest {
            folder_path: path.to_string(),
            operation: Operation::FullIndex,
            patterns: vec![],
            chunking: ChunkingOptions {
                max_chunk_tokens: 512,
                overlap_tokens: 32,
                include_code: true,
            },
        }
    }

    #[tokio::test]
    async fn dedupe_hit_does_not_grow_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::load(dir.path().join("q.jsonl"), 10, 24).unwrap();

        let first = queue.submit(sample_request("/p")).await.unwrap();
        assert!(!first.dedupe_hit);

        let second = queue.submit(sample_request("/p")).await.unwrap();
        assert!(second.dedupe_hit);
        assert_eq!(second.job.id, first.job.id);
        assert_eq!(second.queue_length, 1);
    }

    #[tokio::test]
    async fn queue_full_rejects_new_distinct_submissions() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::load(dir.path().join("q.jsonl"), 1, 24).unwrap();

        queue.submit(sample_request("/a")).await.unwrap();
        let err = queue.submit(sample_request("/b")).await.unwrap_err();
        assert!(matches!(err, RetrievaError::QueueFull));
    }

    #[tokio::test]
    async fn crash_recovery_resets_running_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.jsonl");

        let queue = JobQueue::load(&path, 10, 24).unwrap();
        let submission = queue.submit(sample_request("/p")).await.unwrap();
        queue.take_next_pending().await;
        assert_eq!(
            queue.get(submission.job.id).await.unwrap().status,
            JobStatus::Running
        );

        let recovered = JobQueue::load(&path, 10, 24).unwrap();
        let job = recovered.get(submission.job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }
}
