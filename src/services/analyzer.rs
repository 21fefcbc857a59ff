use reqwest::Client;
use serde::Serialize;
use tokio::runtime::Handle;

use crate::models::analysis::AnalysisResult;
use crate::models::location::{Direction, LocationTask};

/// A blocking, possibly slow and fallible traffic analysis for one location.
///
/// Implementations are called from the blocking thread pool, never from an
/// async task directly.
pub trait Analyzer: Send + Sync + 'static {
    fn analyze(
        &self,
        location: &LocationTask,
        proxy: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError>;
}

impl<F> Analyzer for F
where
    F: Fn(&LocationTask, Option<&str>) -> Result<AnalysisResult, AnalysisError>
        + Send
        + Sync
        + 'static,
{
    fn analyze(
        &self,
        location: &LocationTask,
        proxy: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self(location, proxy)
    }
}

/// Pin a closure to the [`Analyzer`] call signature.
pub fn analyzer_fn<F>(f: F) -> F
where
    F: Fn(&LocationTask, Option<&str>) -> Result<AnalysisResult, AnalysisError>
        + Send
        + Sync
        + 'static,
{
    f
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("There is no analysis data: {0}")]
    NoData(String),

    #[error("Analysis service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analysis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Analysis panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    lat: f64,
    lng: f64,
    storefront_direction: Direction,
    /// Compass bearing of `storefront_direction`, for drawing the storefront cone.
    storefront_heading: u16,
    day: Option<&'a str>,
    time: Option<&'a str>,
    proxy: Option<&'a str>,
}

/// Client for a remote analysis service that drives the browser and
/// classifies the traffic layer.
pub struct HttpAnalyzer {
    http: Client,
    url: String,
    runtime: Handle,
}

impl HttpAnalyzer {
    /// Must be created from inside a tokio runtime; requests are driven on it.
    pub fn new(url: impl Into<String>) -> Result<Self, AnalysisError> {
        let runtime = Handle::try_current()
            .map_err(|e| AnalysisError::Other(format!("No tokio runtime: {}", e)))?;
        Ok(Self {
            http: Client::new(),
            url: url.into(),
            runtime,
        })
    }

    async fn request(
        &self,
        location: &LocationTask,
        proxy: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let body = AnalyzeRequest {
            lat: location.lat,
            lng: location.lng,
            storefront_direction: location.direction,
            storefront_heading: location.direction.degrees(),
            day: location.day.as_deref(),
            time: location.time.as_deref(),
            proxy,
        };

        let response = self.http.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response.json().await?;
        if let Some(error) = value.get("error") {
            return Err(AnalysisError::NoData(error.to_string()));
        }

        serde_json::from_value(value).map_err(|e| AnalysisError::NoData(e.to_string()))
    }
}

impl Analyzer for HttpAnalyzer {
    fn analyze(
        &self,
        location: &LocationTask,
        proxy: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.runtime.block_on(self.request(location, proxy))
    }
}
