use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::analysis::LocationOutcome;
use crate::models::job::{JobPayload, JobRecord, JobResult, JobStatus};

/// Thread-safe map of job id to job record.
///
/// Every read hands out a cloned snapshot and every mutation happens under a
/// single lock, so observers never see a half-updated record.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

/// Number of in-memory jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
    pub canceled: usize,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        // Mutations below never panic midway, so a poisoned map is still consistent.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, record: JobRecord) {
        self.jobs().insert(record.id.clone(), record);
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs().get(job_id).cloned()
    }

    /// Request cancellation. Non-terminal jobs flip to `Canceled` right away;
    /// terminal jobs are returned untouched.
    pub fn cancel(&self, job_id: &str) -> Option<JobRecord> {
        let mut jobs = self.jobs();
        let job = jobs.get_mut(job_id)?;

        if !job.status.is_terminal() {
            job.cancel_requested = true;
            job.status = JobStatus::Canceled;
            job.touch();
        }

        Some(job.clone())
    }

    /// Delete a record. Unknown ids are ignored.
    pub fn remove(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs().remove(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status_counts(&self) -> StatusCounts {
        let jobs = self.jobs();
        let mut counts = StatusCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Done => counts.done += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Canceled => counts.canceled += 1,
            }
        }
        counts
    }

    /// Move a pending job to `Running` and size its result slots.
    ///
    /// Returns the payload to execute, or `None` when the job vanished or was
    /// canceled before a worker picked it up.
    pub fn start(&self, job_id: &str) -> Option<JobPayload> {
        let mut jobs = self.jobs();
        let job = jobs.get_mut(job_id)?;
        if job.status != JobStatus::Pending {
            return None;
        }

        let count = job.payload.locations.len();
        job.status = JobStatus::Running;
        job.result = JobResult {
            count,
            results: vec![None; count],
        };
        job.remaining = count;
        job.touch();

        Some(job.payload.clone())
    }

    /// Decide whether the next location may be dispatched.
    ///
    /// Checked and counted under the lock, so once `cancel` has returned no
    /// further location of that job is dispatched.
    pub fn try_dispatch(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs();
        match jobs.get_mut(job_id) {
            Some(job) if !job.cancel_requested => {
                job.dispatched += 1;
                true
            }
            _ => false,
        }
    }

    /// Store the outcome of one location at its original position.
    pub fn record_outcome(&self, job_id: &str, index: usize, outcome: LocationOutcome) {
        let mut jobs = self.jobs();
        let Some(job) = jobs.get_mut(job_id) else {
            return;
        };
        let Some(slot) = job.result.results.get_mut(index) else {
            return;
        };

        if outcome.is_failure() {
            job.failures += 1;
        }
        *slot = Some(outcome);
        job.remaining = job.remaining.saturating_sub(1);
        job.touch();
    }

    /// Settle a running job. A job canceled meanwhile keeps its `Canceled`
    /// status and gets no error attached.
    pub fn finish(&self, job_id: &str, outcome: Result<(), String>) -> Option<JobStatus> {
        let mut jobs = self.jobs();
        let job = jobs.get_mut(job_id)?;

        match outcome {
            Ok(()) if job.status == JobStatus::Running => job.status = JobStatus::Done,
            Err(error) if job.status == JobStatus::Running => {
                job.status = JobStatus::Failed;
                job.error = Some(format!("The job failed: {}", error));
            }
            _ => {}
        }
        job.touch();

        Some(job.status)
    }
}
