//! Job service boundary
//!
//! The gateway never executes, stores or schedules jobs itself. It talks to a
//! [`JobService`] and only reads the serialized snapshots it returns.

mod job;
mod memory;

use async_trait::async_trait;
pub use job::{DbConnectionParams, Job, JobCreateRequest, JobStatus};
pub use memory::InMemoryJobService;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobServiceError {
    #[error("Job with id {0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Cannot set status from {from} to {to}")]
    InvalidStatusTransition { from: JobStatus, to: JobStatus },

    #[error("Job service unavailable: {0}")]
    Unavailable(String),

    #[error("Job service error: {0}")]
    Internal(String),
}

/// External collaborator owning job lifecycle.
///
/// Implementations handle their own retries and concurrency control; the
/// gateway calls each method at most once per request.
#[async_trait]
pub trait JobService: Send + Sync {
    async fn create(&self, data: JobCreateRequest) -> Result<Job, JobServiceError>;

    async fn get(&self, job_id: &str) -> Result<Job, JobServiceError>;

    async fn cancel(&self, job_id: &str) -> Result<Job, JobServiceError>;

    /// Already-serialized summaries of every pending or running job.
    async fn list_work_in_progress_jobs(&self) -> Result<Vec<Value>, JobServiceError>;
}
