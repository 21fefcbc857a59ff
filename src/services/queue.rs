use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::models::job::{JobPayload, JobRecord};
use crate::services::analyzer::Analyzer;
use crate::services::id::new_job_id;
use crate::services::registry::{JobRegistry, StatusCounts};
use crate::services::retry::RetryPolicy;
use crate::services::scheduler::LocationScheduler;
use crate::services::worker::Worker;

/// Sizing of the worker pool and of each job's location fan-out.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs processed at the same time.
    pub workers: usize,
    /// Locations analyzed at the same time inside one job.
    pub per_job_concurrency: usize,
    pub retry: RetryPolicy,
    /// Directory the analyzer saves screenshots under.
    pub static_dir: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            per_job_concurrency: 3,
            retry: RetryPolicy::default(),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// In-process job queue: a registry of job records, an unbounded submission
/// channel and a fixed pool of workers draining it.
///
/// Cloning is cheap; workers stop once every clone is dropped.
#[derive(Clone)]
pub struct JobQueue {
    registry: Arc<JobRegistry>,
    sender: mpsc::UnboundedSender<String>,
}

impl JobQueue {
    /// Spawn the worker pool on the current tokio runtime.
    pub fn start(config: QueueConfig, analyzer: Arc<dyn Analyzer>) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let scheduler = LocationScheduler::new(
            Arc::clone(&registry),
            analyzer,
            config.per_job_concurrency,
            config.retry,
            config.static_dir.clone(),
        );

        let workers = config.workers.max(1);
        for id in 0..workers {
            let worker = Worker {
                id,
                registry: Arc::clone(&registry),
                receiver: Arc::clone(&receiver),
                scheduler: scheduler.clone(),
            };
            tokio::spawn(worker.run());
        }

        tracing::info!(
            workers,
            per_job_concurrency = config.per_job_concurrency,
            max_attempts = config.retry.max_attempts,
            "Job queue started"
        );

        Self { registry, sender }
    }

    /// Register a batch and hand it to the worker pool. Never waits for
    /// execution. Batches over the location cap are truncated.
    pub fn submit(&self, mut payload: JobPayload) -> Result<String, QueueError> {
        let dropped = payload.truncate();
        let job_id = new_job_id();

        if dropped > 0 {
            tracing::warn!(job_id = %job_id, dropped, "Batch over location limit truncated");
        }

        self.registry.insert(JobRecord::new(job_id.clone(), payload));

        if self.sender.send(job_id.clone()).is_err() {
            self.registry.remove(&job_id);
            return Err(QueueError::Closed);
        }

        metrics::counter!("traffic_jobs_submitted_total").increment(1);
        metrics::gauge!("traffic_jobs_in_memory").set(self.registry.len() as f64);
        tracing::info!(job_id = %job_id, "Job submitted");

        Ok(job_id)
    }

    /// Current snapshot of a job.
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.registry.get(job_id)
    }

    /// Request cooperative cancellation. Already-terminal jobs are returned
    /// unchanged.
    pub fn cancel(&self, job_id: &str) -> Option<JobRecord> {
        let record = self.registry.cancel(job_id)?;
        tracing::info!(job_id = %job_id, status = %record.status, "Cancellation requested");
        Some(record)
    }

    /// Forget a job. Unknown ids are ignored.
    pub fn remove(&self, job_id: &str) {
        if self.registry.remove(job_id).is_some() {
            tracing::debug!(job_id = %job_id, "Job removed");
        }
        metrics::gauge!("traffic_jobs_in_memory").set(self.registry.len() as f64);
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.registry.status_counts()
    }

    /// Whether the worker pool can still receive jobs.
    pub fn is_accepting(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Job queue is not accepting submissions: worker pool stopped")]
    Closed,
}
