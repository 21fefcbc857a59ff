use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::batch::{BatchRequest, JobStatusResponse, SubmitResponse};
use crate::models::job::{JobPayload, JobRecord, JobStatus};

/// POST /analyze-batch: Queue a batch of locations for traffic analysis.
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<SubmitResponse>, StatusCode> {
    if let Err(report) = request.validate() {
        tracing::warn!(error = %report, "Rejected batch request");
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let mut payload = JobPayload::new(request.locations);
    payload.proxy = request.proxy.or_else(|| state.default_proxy.clone());
    payload.base_url = state.public_base_url.clone();

    let job_id = state.queue.submit(payload).map_err(|e| {
        tracing::error!(error = %e, "Failed to submit batch");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(SubmitResponse {
        job_id,
        status: JobStatus::Pending,
    }))
}

/// GET /job/{job_id}: Poll a job.
///
/// Once a job has settled it is written to the archive (when configured) and
/// evicted from memory; later polls are answered from the archive.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    if let Some(record) = state.queue.get(&job_id) {
        if record.is_settled() {
            archive_and_evict(&state, &record).await;
        }
        return Ok(Json(record.into()));
    }

    match find_archived(&state, &job_id).await? {
        Some(record) => Ok(Json(record.into())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// POST /job/{job_id}/cancel: Stop dispatching further locations of a job.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    if let Some(record) = state.queue.cancel(&job_id) {
        return Ok(Json(record.into()));
    }

    // Archived jobs are terminal, so canceling them changes nothing.
    match find_archived(&state, &job_id).await? {
        Some(record) => Ok(Json(record.into())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// DELETE /job/{job_id}: Drop a job from memory. Archived rows are kept.
pub async fn delete_job(State(state): State<AppState>, Path(job_id): Path<String>) -> StatusCode {
    state.queue.remove(&job_id);
    StatusCode::NO_CONTENT
}

async fn archive_and_evict(state: &AppState, record: &JobRecord) {
    let Some(pool) = &state.db else {
        return;
    };

    match queries::archive_job(pool, record).await {
        Ok(()) => {
            state.queue.remove(&record.id);
            tracing::info!(job_id = %record.id, status = %record.status, "Job archived");
        }
        Err(e) => {
            // Stays in memory; the next poll retries.
            tracing::warn!(job_id = %record.id, error = %e, "DB log failed to archive job");
        }
    }
}

async fn find_archived(state: &AppState, job_id: &str) -> Result<Option<JobRecord>, StatusCode> {
    let Some(pool) = &state.db else {
        return Ok(None);
    };

    queries::get_archived_job(pool, job_id).await.map_err(|e| {
        tracing::error!(job_id = %job_id, error = %e, "Failed to read archived job");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
