use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::{JobRecord, JobResult, JobStatus};
use crate::models::location::LocationTask;

/// Body of `POST /analyze-batch`.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchRequest {
    #[garde(length(min = 1), dive)]
    pub locations: Vec<LocationTask>,

    #[serde(default)]
    #[garde(length(min = 1, max = 512))]
    pub proxy: Option<String>,
}

/// Response after submitting a batch.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Response for polling or canceling a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub remaining: usize,
    pub failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        let has_result = record.result.count > 0 || record.status.is_terminal();
        let result = has_result.then_some(record.result);
        Self {
            job_id: record.id,
            status: record.status,
            remaining: record.remaining,
            failures: record.failures,
            result,
            error: record.error,
        }
    }
}
