//! Mock analyzers and polling helpers shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use sqlx::PgPool;
use tokio::time::sleep;
use traffic_jobs::models::analysis::AnalysisResult;
use traffic_jobs::models::job::JobRecord;
use traffic_jobs::models::location::LocationTask;
use traffic_jobs::services::analyzer::{AnalysisError, Analyzer};
use traffic_jobs::services::queue::{JobQueue, QueueConfig};
use traffic_jobs::services::retry::RetryPolicy;

/// Retry policy with millisecond backoff so failing tests stay fast.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

pub fn queue_config(workers: usize, per_job_concurrency: usize) -> QueueConfig {
    QueueConfig {
        workers,
        per_job_concurrency,
        retry: fast_retry(2),
        ..QueueConfig::default()
    }
}

pub fn locations(n: usize) -> Vec<LocationTask> {
    (0..n)
        .map(|i| LocationTask::new(i as f64 * 0.5, 10.0 + i as f64))
        .collect()
}

/// Scores `lat + lng` after an optional sleep and tracks how many calls run
/// at once.
#[derive(Default)]
pub struct RecordingAnalyzer {
    pub delay: Duration,
    /// Extra random delay in `0..jitter_ms` milliseconds per call.
    pub jitter_ms: u64,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

impl RecordingAnalyzer {
    pub fn new(delay: Duration, jitter_ms: u64) -> Self {
        Self {
            delay,
            jitter_ms,
            ..Self::default()
        }
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Analyzer for RecordingAnalyzer {
    fn analyze(
        &self,
        location: &LocationTask,
        _proxy: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        } else {
            0
        };
        std::thread::sleep(self.delay + Duration::from_millis(jitter));

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(AnalysisResult::new(location.lat + location.lng, "mock"))
    }
}

/// Fails the first `failures_per_location` calls for every location, then
/// succeeds. Counts attempts per latitude.
pub struct FlakyAnalyzer {
    pub failures_per_location: usize,
    attempts: Mutex<HashMap<u64, usize>>,
}

impl FlakyAnalyzer {
    pub fn new(failures_per_location: usize) -> Self {
        Self {
            failures_per_location,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn attempts_for(&self, lat: f64) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(&lat.to_bits())
            .copied()
            .unwrap_or(0)
    }
}

impl Analyzer for FlakyAnalyzer {
    fn analyze(
        &self,
        location: &LocationTask,
        _proxy: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(location.lat.to_bits()).or_insert(0);
            *count += 1;
            *count
        };

        if attempt <= self.failures_per_location {
            Err(AnalysisError::Other(format!("attempt {} failed", attempt)))
        } else {
            Ok(AnalysisResult::new(location.lat + location.lng, "flaky"))
        }
    }
}

pub fn start_queue(config: QueueConfig, analyzer: Arc<dyn Analyzer>) -> JobQueue {
    JobQueue::start(config, analyzer)
}

/// Poll until the job is terminal and every dispatched location reported.
pub async fn wait_settled(queue: &JobQueue, job_id: &str, timeout: Duration) -> JobRecord {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = queue.get(job_id).expect("job disappeared while polling");
        if job.is_settled() {
            return job;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("job {} not settled in time: {:?}", job_id, job.status);
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until `predicate` holds for the job.
pub async fn wait_until<F>(
    queue: &JobQueue,
    job_id: &str,
    timeout: Duration,
    predicate: F,
) -> JobRecord
where
    F: Fn(&JobRecord) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = queue.get(job_id).expect("job disappeared while polling");
        if predicate(&job) {
            return job;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached for job {}: {:?}", job_id, job.status);
        }
        sleep(Duration::from_millis(2)).await;
    }
}

/// Delete an archived job; its log rows go with it through the foreign key.
pub async fn delete_archived_job(pool: &PgPool, job_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM traffic_jobs WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
