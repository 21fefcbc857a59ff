use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};

use crate::models::job::JobStatus;
use crate::services::registry::JobRegistry;
use crate::services::scheduler::LocationScheduler;

/// Shared end of the submission channel.
pub(crate) type SubmissionReceiver = Arc<Mutex<mpsc::UnboundedReceiver<String>>>;

/// Long-lived loop that takes one job id at a time off the submission
/// channel and drives that job to a terminal status.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) receiver: SubmissionReceiver,
    pub(crate) scheduler: LocationScheduler,
}

impl Worker {
    pub(crate) async fn run(self) {
        tracing::info!(worker = self.id, "Worker started");

        loop {
            // Only the wait for the next id is serialized between workers.
            let next = {
                let mut receiver = self.receiver.lock().await;
                receiver.recv().await
            };

            match next {
                Some(job_id) => {
                    self.process(&job_id).await;
                }
                None => break,
            }
        }

        tracing::info!(worker = self.id, "Submission channel closed, worker stopping");
    }

    /// Run one job. Returns the status it ended with, or `None` when it was
    /// never started.
    async fn process(&self, job_id: &str) -> Option<JobStatus> {
        let Some(payload) = self.registry.start(job_id) else {
            tracing::debug!(
                worker = self.id,
                job_id = %job_id,
                "Job removed or canceled before start, skipping"
            );
            return None;
        };

        tracing::info!(
            worker = self.id,
            job_id = %job_id,
            locations = payload.locations.len(),
            "Processing job"
        );
        let start = Instant::now();

        let outcome = match self.scheduler.run(job_id, &payload).await {
            Ok(results) => {
                let completed = results.iter().filter(|slot| slot.is_some()).count();
                let failed = results
                    .iter()
                    .flatten()
                    .filter(|outcome| outcome.is_failure())
                    .count();
                tracing::debug!(
                    job_id = %job_id,
                    completed,
                    failed,
                    "All dispatched locations settled"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to complete the job");
                Err(e.to_string())
            }
        };

        let run_ok = outcome.is_ok();
        let status = match self.registry.finish(job_id, outcome) {
            Some(status) => status,
            None => {
                tracing::debug!(job_id = %job_id, "Job removed while running");
                vanished_status(run_ok)
            }
        };

        let elapsed = start.elapsed();
        metrics::histogram!("traffic_job_duration_seconds").record(elapsed.as_secs_f64());
        metrics::counter!("traffic_jobs_completed_total", "status" => status.to_string())
            .increment(1);

        tracing::info!(
            worker = self.id,
            job_id = %job_id,
            status = %status,
            duration_ms = elapsed.as_millis() as u64,
            "Job finished"
        );

        Some(status)
    }
}

/// Status reported for a running job whose record disappeared before it
/// finished.
///
/// A running record only leaves the registry once it was canceled and its
/// dispatched locations reported, or when it was deleted. Either way dispatch
/// stopped as for a cancel.
fn vanished_status(run_ok: bool) -> JobStatus {
    if run_ok {
        JobStatus::Canceled
    } else {
        JobStatus::Failed
    }
}
