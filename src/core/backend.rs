use async_trait::async_trait;

use super::submission::Submission;
use crate::api::error::ClientError;
use crate::api::types::JobData;

/// The job-facing half of the backend: submission and status lookups.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit a job once and return its id. Never retried: a retry after an
    /// ambiguous failure could post twice.
    async fn submit(&self, submission: &Submission) -> Result<String, ClientError>;

    /// Current status of a job, with the transient-error retry policy applied.
    async fn job_status(&self, job_id: &str) -> Result<JobData, ClientError>;
}
