//! Job entity as seen by the gateway.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Cancelled,
    Failed,
    Unknown,
}

impl JobStatus {
    /// Final statuses never transition again.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Cancelled | JobStatus::Failed | JobStatus::Unknown
        )
    }

    pub fn is_work_in_progress(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

/// Database coordinates a job executes against.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConnectionParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
}

impl fmt::Debug for DbConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Payload handed to [`JobService::create`](super::JobService::create).
#[derive(Debug, Clone, PartialEq)]
pub struct JobCreateRequest {
    pub user: String,
    pub query: Value,
    pub host: String,
    pub port: u16,
    pub pass: Option<String>,
    pub dbname: String,
    pub dbuser: String,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub user: String,
    pub status: JobStatus,
    pub query: Value,
    pub connection: DbConnectionParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub failed_reason: Option<String>,
}

#[derive(Serialize)]
struct JobView<'a> {
    job_id: &'a str,
    user: &'a str,
    status: JobStatus,
    query: &'a Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_reason: Option<&'a str>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, request: JobCreateRequest) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            user: request.user,
            status: JobStatus::Pending,
            query: request.query,
            connection: DbConnectionParams {
                host: request.host,
                port: request.port,
                dbname: request.dbname,
                user: request.dbuser,
                password: request.pass,
            },
            created_at: now,
            updated_at: now,
            failed_reason: None,
        }
    }

    /// Transport representation. Connection parameters never leave the service.
    pub fn serialize(&self) -> Value {
        let view = JobView {
            job_id: &self.job_id,
            user: &self.user,
            status: self.status,
            query: &self.query,
            created_at: self.created_at,
            updated_at: self.updated_at,
            failed_reason: self.failed_reason.as_deref(),
        };
        serde_json::to_value(view).unwrap_or(Value::Null)
    }

    /// Short form used by the work-in-progress listing.
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "job_id": self.job_id,
            "user": self.user,
            "status": self.status,
            "created_at": self.created_at,
        })
    }
}
