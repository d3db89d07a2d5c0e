//! The single-concurrency worker that drives pending jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use retrieva_common::RetrievaError;
use uuid::Uuid;

use crate::model::{Job, JobProgress, JobStatus};
use crate::queue::JobQueue;

/// A one-way push of progress from a running job.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: JobProgress);
    /// Checked by the driver at batch boundaries; cooperative, not preemptive.
    async fn cancel_requested(&self) -> bool;
}

/// Outcome of a completed (non-cancelled, non-timed-out) run.
pub struct JobOutcome {
    pub total_documents: u64,
    pub total_chunks: u64,
}

/// The Indexing Pipeline, from the job queue's point of view. Defined here
/// rather than depending on `retrieva-indexing` directly so the queue
/// stays reusable independent of what drives it; the composition root
/// supplies the concrete implementation.
#[async_trait]
pub trait IndexingDriver: Send + Sync {
    /// # Errors
    /// `IndexingError` on a terminal failure; the worker persists it into
    /// the job record rather than propagating it further.
    async fn run(
        &self,
        job: &Job,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<JobOutcome, RetrievaError>;
}

struct QueueProgressSink {
    queue: Arc<JobQueue>,
    job_id: Uuid,
}

#[async_trait]
impl ProgressSink for QueueProgressSink {
    async fn report(&self, progress: JobProgress) {
        let job_id = self.job_id;
        self.queue.update(job_id, move |job| job.progress = progress).await;
    }

    async fn cancel_requested(&self) -> bool {
        self.queue.is_cancel_requested(self.job_id).await
    }
}

/// Drives the queue: waits for a signal, takes the oldest pending job,
/// runs it under a per-job timeout, and persists the outcome.
pub struct Worker {
    queue: Arc<JobQueue>,
    driver: Arc<dyn IndexingDriver>,
    job_timeout: Duration,
}

impl Worker {
    #[must_use]
    pub fn new(queue: Arc<JobQueue>, driver: Arc<dyn IndexingDriver>, job_timeout: Duration) -> Self {
        Self {
            queue,
            driver,
            job_timeout,
        }
    }

    /// Run the worker loop until the process is cancelled via `shutdown`.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let notify = self.queue.notifier();
        loop {
            let Some(job) = self.queue.take_next_pending().await else {
                tokio::select! {
                    () = notify.notified() => continue,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
                continue;
            };

            self.run_one(job).await;

            if *shutdown.borrow() {
                return;
            }
        }
    }

    async fn run_one(&self, job: Job) {
        let sink: Arc<dyn ProgressSink> = Arc::new(QueueProgressSink {
            queue: Arc::clone(&self.queue),
            job_id: job.id,
        });

        let result = tokio::time::timeout(self.job_timeout, self.driver.run(&job, sink)).await;

        let job_id = job.id;
        match result {
            Ok(Ok(outcome)) => {
                let cancelled = self.queue.is_cancel_requested(job_id).await;
                self.queue
                    .update(job_id, move |j| {
                        j.finished_at = Some(Utc::now());
                        if cancelled {
                            j.status = JobStatus::Cancelled;
                        } else {
                            j.status = JobStatus::Done;
                            j.total_documents = outcome.total_documents;
                            j.total_chunks = outcome.total_chunks;
                        }
                    })
                    .await;
            }
            Ok(Err(err)) => {
                tracing::warn!(job_id = %job_id, error = %err, "indexing job failed");
                let message = err.to_string();
                self.queue
                    .update(job_id, move |j| {
                        j.status = JobStatus::Failed;
                        j.finished_at = Some(Utc::now());
                        j.error = Some(message);
                    })
                    .await;
            }
            Err(_elapsed) => {
                tracing::warn!(job_id = %job_id, "indexing job exceeded its timeout");
                self.queue
                    .update(job_id, move |j| {
                        j.status = JobStatus::Failed;
                        j.finished_at = Some(Utc::now());
                        j.error = Some("job exceeded its timeout".to_string());
                    })
                    .await;
            }
        }
    }
}
