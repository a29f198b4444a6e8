//! Job DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobId, JobStatus};
use crate::domain::serde_helpers::blank_as_none;

/// One page of the job list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPage {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Job>,
}

/// Body of the list endpoint
///
/// The service paginates by default but answers with a bare array when
/// pagination is switched off.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JobListResponse {
    Page(JobPage),
    Plain(Vec<Job>),
}

impl JobListResponse {
    /// Returns the jobs in server order
    pub fn into_jobs(self) -> Vec<Job> {
        match self {
            JobListResponse::Page(page) => page.results,
            JobListResponse::Plain(jobs) => jobs,
        }
    }
}

/// Lightweight status-only payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusSummary {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}
