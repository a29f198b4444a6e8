//! Transport abstraction
//!
//! The tracker talks to the analysis service only through this trait, which
//! keeps it testable against scripted in-memory implementations.

use async_trait::async_trait;
use deckwatch_core::domain::job::{Job, JobId};
use deckwatch_core::dto::job::JobStatusSummary;

use crate::AnalysisClient;
use crate::error::Result;
use crate::upload::DocumentUpload;

/// Request/response contract of the analysis service
///
/// Every operation is all-or-nothing: no partial results, no streaming.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Submits a document and returns the initial job snapshot
    async fn create_job(&self, upload: DocumentUpload) -> Result<Job>;

    /// Fetches the full current snapshot of a job
    async fn get_job(&self, id: &JobId) -> Result<Job>;

    /// Lists jobs in server order
    async fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Fetches the lightweight status of a job
    async fn get_job_status(&self, id: &JobId) -> Result<JobStatusSummary>;
}

#[async_trait]
impl JobTransport for AnalysisClient {
    async fn create_job(&self, upload: DocumentUpload) -> Result<Job> {
        AnalysisClient::create_job(self, upload).await
    }

    async fn get_job(&self, id: &JobId) -> Result<Job> {
        AnalysisClient::get_job(self, id).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        AnalysisClient::list_jobs(self).await
    }

    async fn get_job_status(&self, id: &JobId) -> Result<JobStatusSummary> {
        AnalysisClient::get_job_status(self, id).await
    }
}
