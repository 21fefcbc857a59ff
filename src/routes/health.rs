use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::registry::StatusCounts;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
    pub jobs: StatusCounts,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub workers: ComponentHealth,
    pub database: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn ok(latency_ms: Option<u64>) -> Self {
        Self {
            status: "ok".to_string(),
            latency_ms,
        }
    }

    fn named(status: &str) -> Self {
        Self {
            status: status.to_string(),
            latency_ms: None,
        }
    }
}

/// GET /health: worker pool and archive status plus in-memory job counts.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let workers_check = if state.queue.is_accepting() {
        ComponentHealth::ok(None)
    } else {
        ComponentHealth::named("error")
    };

    // The archive is optional; an unconfigured database does not degrade health.
    let db_check = match &state.db {
        Some(pool) => {
            let start = std::time::Instant::now();
            match sqlx::query("SELECT 1").execute(pool).await {
                Ok(_) => ComponentHealth::ok(Some(start.elapsed().as_millis() as u64)),
                Err(_) => ComponentHealth::named("error"),
            }
        }
        None => ComponentHealth::named("disabled"),
    };

    let all_healthy = workers_check.status == "ok" && db_check.status != "error";
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            workers: workers_check,
            database: db_check,
        },
        jobs: state.queue.status_counts(),
    };

    (status_code, Json(response))
}
