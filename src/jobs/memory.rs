//! In-process job service used by the standalone binary and tests.
//!
//! Jobs are accepted in `pending` state and stay there until something calls
//! [`InMemoryJobService::set_status`]; there is no executor behind it.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{Job, JobCreateRequest, JobService, JobServiceError, JobStatus};

#[derive(Debug, Default)]
pub struct InMemoryJobService {
    jobs: DashMap<String, (u64, Job)>,
    next_seq: AtomicU64,
}

impl InMemoryJobService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drive a job to a new status, enforcing that final jobs stay final.
    pub fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        failed_reason: Option<String>,
    ) -> Result<Job, JobServiceError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| JobServiceError::NotFound(job_id.to_string()))?;
        let job = &mut entry.value_mut().1;

        if job.status.is_final() && job.status != status {
            return Err(JobServiceError::InvalidStatusTransition {
                from: job.status,
                to: status,
            });
        }

        job.status = status;
        job.updated_at = Utc::now();
        if status == JobStatus::Failed {
            job.failed_reason = failed_reason;
        }
        Ok(job.clone())
    }
}

fn validate_query(query: &Value) -> Result<(), JobServiceError> {
    let invalid = || JobServiceError::InvalidRequest("You must indicate a valid SQL".to_string());

    match query {
        Value::String(sql) if !sql.trim().is_empty() => Ok(()),
        Value::Array(queries) if !queries.is_empty() => {
            if queries
                .iter()
                .all(|q| q.as_str().is_some_and(|s| !s.trim().is_empty()))
            {
                Ok(())
            } else {
                Err(invalid())
            }
        }
        // Fallback jobs: {"query": [{"query": "...", "onerror": "..."}, ...], "onsuccess": ...}
        Value::Object(obj) => match obj.get("query") {
            Some(Value::Array(queries)) if !queries.is_empty() => {
                let valid = queries.iter().all(|q| match q {
                    Value::String(s) => !s.trim().is_empty(),
                    Value::Object(inner) => inner
                        .get("query")
                        .and_then(Value::as_str)
                        .is_some_and(|s| !s.trim().is_empty()),
                    _ => false,
                });
                if valid {
                    Ok(())
                } else {
                    Err(invalid())
                }
            }
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

#[async_trait]
impl JobService for InMemoryJobService {
    async fn create(&self, data: JobCreateRequest) -> Result<Job, JobServiceError> {
        validate_query(&data.query)?;

        let job = Job::new(Uuid::new_v4().to_string(), data);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.jobs.insert(job.job_id.clone(), (seq, job.clone()));

        debug!(job_id = %job.job_id, user = %job.user, "Job enqueued");
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> Result<Job, JobServiceError> {
        self.jobs
            .get(job_id)
            .map(|entry| entry.value().1.clone())
            .ok_or_else(|| JobServiceError::NotFound(job_id.to_string()))
    }

    async fn cancel(&self, job_id: &str) -> Result<Job, JobServiceError> {
        let current = self.get(job_id).await?;
        match current.status {
            JobStatus::Cancelled => Ok(current),
            status if status.is_work_in_progress() => {
                self.set_status(job_id, JobStatus::Cancelled, None)
            }
            status => Err(JobServiceError::InvalidStatusTransition {
                from: status,
                to: JobStatus::Cancelled,
            }),
        }
    }

    async fn list_work_in_progress_jobs(&self) -> Result<Vec<Value>, JobServiceError> {
        let mut wip: Vec<(u64, Value)> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().1.status.is_work_in_progress())
            .map(|entry| (entry.value().0, entry.value().1.summary()))
            .collect();
        wip.sort_by_key(|(seq, _)| *seq);
        Ok(wip.into_iter().map(|(_, summary)| summary).collect())
    }
}
