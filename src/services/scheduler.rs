use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::models::analysis::{AnalysisResult, LocationOutcome};
use crate::models::job::JobPayload;
use crate::models::location::LocationTask;
use crate::services::analyzer::{AnalysisError, Analyzer};
use crate::services::registry::JobRegistry;
use crate::services::retry::{retry, RetryPolicy};
use crate::services::screenshot::screenshot_url;

/// Runs the locations of one job with at most `concurrency` analyses in
/// flight, writing each outcome back at its original position.
#[derive(Clone)]
pub struct LocationScheduler {
    registry: Arc<JobRegistry>,
    analyzer: Arc<dyn Analyzer>,
    concurrency: usize,
    retry: RetryPolicy,
    static_dir: Arc<PathBuf>,
}

impl LocationScheduler {
    pub fn new(
        registry: Arc<JobRegistry>,
        analyzer: Arc<dyn Analyzer>,
        concurrency: usize,
        retry: RetryPolicy,
        static_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            analyzer,
            concurrency: concurrency.max(1),
            retry,
            static_dir: Arc::new(static_dir),
        }
    }

    /// Analyze every location of `payload` for job `job_id`.
    ///
    /// Outcomes are recorded in the registry as they complete (in completion
    /// order) and also returned in submission order. Locations never
    /// dispatched because of cancellation stay `None`.
    pub async fn run(
        &self,
        job_id: &str,
        payload: &JobPayload,
    ) -> Result<Vec<Option<LocationOutcome>>, SchedulerError> {
        let total = payload.locations.len();
        let mut results: Vec<Option<LocationOutcome>> = vec![None; total];

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(usize, LocationOutcome)> = JoinSet::new();
        let proxy: Option<Arc<str>> = payload.proxy.as_deref().map(Arc::from);
        let base_url: Option<Arc<str>> = payload.base_url.as_deref().map(Arc::from);

        let mut next = 0;
        let mut dispatching = true;

        loop {
            dispatching = dispatching && next < total;
            if !dispatching && tasks.is_empty() {
                break;
            }

            tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned(), if dispatching => {
                    let permit = permit?;
                    if !self.registry.try_dispatch(job_id) {
                        tracing::info!(
                            job_id = %job_id,
                            skipped = total - next,
                            "Cancellation requested, not dispatching remaining locations"
                        );
                        dispatching = false;
                        continue;
                    }

                    let index = next;
                    next += 1;

                    let location = Arc::new(payload.locations[index].clone());
                    let analyzer = Arc::clone(&self.analyzer);
                    let proxy = proxy.clone();
                    let base_url = base_url.clone();
                    let static_dir = Arc::clone(&self.static_dir);
                    let policy = self.retry;

                    tracing::debug!(job_id = %job_id, index, "Dispatching location");
                    tasks.spawn(async move {
                        let _permit = permit;
                        let attempt = analyze_location(analyzer, location, proxy, &policy).await;
                        let outcome = match attempt {
                            Ok(mut result) => {
                                if let Some(base_url) = base_url.as_deref() {
                                    attach_screenshot_url(&mut result, base_url, &static_dir);
                                }
                                LocationOutcome::Analyzed(result)
                            }
                            Err(e) => LocationOutcome::failed(e),
                        };
                        (index, outcome)
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    let (index, outcome) = joined?;
                    if let LocationOutcome::Failed(failure) = &outcome {
                        tracing::error!(
                            job_id = %job_id,
                            index,
                            error = %failure.error,
                            "Failed to analyze location"
                        );
                        metrics::counter!("traffic_locations_failed_total").increment(1);
                    }
                    self.registry.record_outcome(job_id, index, outcome.clone());
                    results[index] = Some(outcome);
                }
                else => break,
            }
        }

        Ok(results)
    }
}

/// One location, retried per `policy`, each attempt on the blocking pool.
async fn analyze_location(
    analyzer: Arc<dyn Analyzer>,
    location: Arc<LocationTask>,
    proxy: Option<Arc<str>>,
    policy: &RetryPolicy,
) -> Result<AnalysisResult, AnalysisError> {
    retry(policy, |_attempt| {
        let analyzer = Arc::clone(&analyzer);
        let location = Arc::clone(&location);
        let proxy = proxy.clone();
        async move {
            tokio::task::spawn_blocking(move || analyzer.analyze(&location, proxy.as_deref()))
                .await
                .unwrap_or_else(|e| Err(AnalysisError::Panicked(e.to_string())))
        }
    })
    .await
}

/// Detail key of the annotated screenshot, used when no plain one was saved.
const PINNED_SCREENSHOT_KEY: &str = "pinned_screenshot_path";

fn attach_screenshot_url(result: &mut AnalysisResult, base_url: &str, static_dir: &Path) {
    let path = result
        .screenshot_path
        .as_deref()
        .filter(|path| !path.is_empty())
        .or_else(|| {
            result
                .details
                .get(PINNED_SCREENSHOT_KEY)
                .and_then(Value::as_str)
                .filter(|path| !path.is_empty())
        });
    let Some(path) = path else {
        return;
    };
    result.screenshot_url = screenshot_url(base_url, static_dir, path);
    if result.screenshot_url.is_none() {
        tracing::warn!(
            screenshot_path = %path,
            static_dir = %static_dir.display(),
            "Screenshot is outside the static directory, no URL attached"
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Concurrency limiter closed: {0}")]
    Semaphore(#[from] AcquireError),

    #[error("Location task aborted: {0}")]
    Task(#[from] JoinError),
}
