use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output of the traffic analysis for a single location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: f64,

    #[serde(default)]
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,

    #[serde(default)]
    pub screenshot_url: Option<String>,

    /// Anything else the analyzer reported (coordinates, storefront details, ...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl AnalysisResult {
    pub fn new(score: f64, method: impl Into<String>) -> Self {
        Self {
            score,
            method: method.into(),
            screenshot_path: None,
            screenshot_url: None,
            details: Map::new(),
        }
    }
}

/// Placeholder stored in a result slot when a location could not be analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationError {
    pub error: String,
}

/// What ended up in one result slot.
///
/// Decoding tries `Analyzed` first; only an object without a `score` is read
/// back as a failure, so an analysis reporting its own `error` detail stays a
/// success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationOutcome {
    Analyzed(AnalysisResult),
    Failed(LocationError),
}

impl LocationOutcome {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        LocationOutcome::Failed(LocationError {
            error: format!("Location analysis failed: {}", message),
        })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, LocationOutcome::Failed(_))
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        match self {
            LocationOutcome::Analyzed(result) => Some(result),
            LocationOutcome::Failed(_) => None,
        }
    }
}
