use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::analysis::LocationOutcome;
use crate::models::location::LocationTask;

/// Most locations a single job will ever analyze.
pub const MAX_LOCATIONS: usize = 20;

/// Lifecycle of a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Canceled)
    }
}

/// Immutable input of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub locations: Vec<LocationTask>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Public URL prefix used to turn screenshot paths into links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl JobPayload {
    pub fn new(locations: Vec<LocationTask>) -> Self {
        Self {
            locations,
            proxy: None,
            base_url: None,
        }
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Drop everything past [`MAX_LOCATIONS`]. Returns how many were dropped.
    pub fn truncate(&mut self) -> usize {
        let dropped = self.locations.len().saturating_sub(MAX_LOCATIONS);
        self.locations.truncate(MAX_LOCATIONS);
        dropped
    }
}

/// Per-location results, `results[i]` answering `payload.locations[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub count: usize,
    pub results: Vec<Option<LocationOutcome>>,
}

/// State of one job as held by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub payload: JobPayload,
    pub result: JobResult,
    pub error: Option<String>,
    pub remaining: usize,
    pub dispatched: usize,
    pub failures: usize,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: String, payload: JobPayload) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            remaining: payload.locations.len(),
            payload,
            result: JobResult::default(),
            error: None,
            dispatched: 0,
            failures: 0,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Terminal and no dispatched location is still outstanding, so the
    /// record will not change any more.
    ///
    /// A canceled job turns terminal before its in-flight locations report.
    pub fn is_settled(&self) -> bool {
        match self.status {
            JobStatus::Done | JobStatus::Failed => true,
            JobStatus::Canceled => {
                let completed = self.result.results.iter().flatten().count();
                completed >= self.dispatched
            }
            JobStatus::Pending | JobStatus::Running => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(JobStatus::Canceled).unwrap(), "canceled");
        assert_eq!(JobStatus::Running.to_string(), "running");
        assert_eq!(JobStatus::from_str("done").unwrap(), JobStatus::Done);
    }

    #[test]
    fn test_truncate_caps_locations() {
        let locations = (0..25).map(|i| LocationTask::new(i as f64, 0.0)).collect();
        let mut payload = JobPayload::new(locations);
        assert_eq!(payload.truncate(), 5);
        assert_eq!(payload.locations.len(), MAX_LOCATIONS);
        assert_eq!(payload.locations[19].lat, 19.0);
        assert_eq!(payload.truncate(), 0);
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = JobRecord::new(
            "abc".to_string(),
            JobPayload::new(vec![LocationTask::new(1.0, 2.0)]),
        );
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.remaining, 1);
        assert!(record.result.results.is_empty());
        assert!(!record.cancel_requested);
        assert!(!record.is_settled());
    }

    #[test]
    fn test_canceled_record_settles_once_dispatched_slots_fill() {
        let mut record = JobRecord::new(
            "abc".to_string(),
            JobPayload::new(vec![LocationTask::new(1.0, 2.0), LocationTask::new(3.0, 4.0)]),
        );
        record.status = JobStatus::Canceled;
        record.result = JobResult {
            count: 2,
            results: vec![None, None],
        };
        record.dispatched = 1;
        assert!(!record.is_settled());

        record.result.results[0] = Some(LocationOutcome::failed("late"));
        assert!(record.is_settled());
    }
}
