use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::services::queue::QueueConfig;
use crate::services::retry::RetryPolicy;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string for the job archive. Without it finished
    /// jobs stay in memory until deleted.
    pub database_url: Option<String>,

    /// Endpoint of the remote traffic analysis service.
    #[serde(default = "default_analyzer_url")]
    pub analyzer_url: String,

    /// Proxy used for batches that do not name one.
    pub selenium_proxy: Option<String>,

    /// Number of jobs processed concurrently.
    #[serde(default = "default_max_jobs")]
    pub jobqueue_max_jobs: usize,

    /// Number of locations analyzed concurrently inside one job.
    #[serde(default = "default_per_job_concurrency")]
    pub jobqueue_per_job_concurrency: usize,

    /// Attempts per location, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Directory screenshots are written to and served from.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Public URL of this service, used to build screenshot links.
    pub public_base_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_analyzer_url() -> String {
    "http://localhost:5000/analyze".to_string()
}

fn default_max_jobs() -> usize {
    2
}

fn default_per_job_concurrency() -> usize {
    3
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_retry_max_ms() -> u64 {
    8000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            workers: self.jobqueue_max_jobs,
            per_job_concurrency: self.jobqueue_per_job_concurrency,
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                base_delay: Duration::from_millis(self.retry_base_ms),
                max_delay: Duration::from_millis(self.retry_max_ms),
            },
            static_dir: self.static_dir.clone(),
        }
    }
}
