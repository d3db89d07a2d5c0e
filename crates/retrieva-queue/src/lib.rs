//! Durable, single-concurrency job queue for indexing requests.
//!
//! Backed by an append-only JSONL file guarded by an advisory lock, with
//! crash recovery, deduplication, and bounded capacity. Decoupled from the
//! storage backend in use and from the concrete indexing implementation
//! (see [`worker::IndexingDriver`]) so it can drive any pipeline that
//! implements that trait.

pub mod model;
pub mod queue;
pub mod store;
pub mod worker;

pub use model::{ChunkingOptions, Job, JobProgress, JobRequest, JobStatus, Operation};
pub use queue::{JobQueue, Submission};
pub use store::JsonlJobStore;
pub use worker::{IndexingDriver, JobOutcome, ProgressSink, Worker};
