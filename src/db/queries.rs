use std::str::FromStr;

use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::models::analysis::LocationOutcome;
use crate::models::job::{JobPayload, JobRecord, JobResult, JobStatus};

/// Persist a finished job and one log row per analyzed location.
///
/// Re-archiving the same job replaces its previous rows.
pub async fn archive_job(pool: &PgPool, job: &JobRecord) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO traffic_jobs (id, status, remaining, dispatched, failures, location_count,
                                  cancel_requested, payload, result, error, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status,
            remaining = EXCLUDED.remaining,
            dispatched = EXCLUDED.dispatched,
            failures = EXCLUDED.failures,
            location_count = EXCLUDED.location_count,
            cancel_requested = EXCLUDED.cancel_requested,
            result = EXCLUDED.result,
            error = EXCLUDED.error,
            updated_at = EXCLUDED.updated_at,
            archived_at = NOW()
        "#,
    )
    .bind(&job.id)
    .bind(job.status.to_string())
    .bind(job.remaining as i32)
    .bind(job.dispatched as i32)
    .bind(job.failures as i32)
    .bind(job.result.count as i32)
    .bind(job.cancel_requested)
    .bind(Json(&job.payload))
    .bind(Json(&job.result))
    .bind(job.error.as_deref())
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM traffic_logs WHERE job_id = $1")
        .bind(&job.id)
        .execute(&mut *tx)
        .await?;

    for (position, (location, slot)) in job
        .payload
        .locations
        .iter()
        .zip(job.result.results.iter())
        .enumerate()
    {
        let Some(outcome) = slot else {
            continue;
        };

        let (score, method, screenshot_url, details, error) = match outcome {
            LocationOutcome::Analyzed(result) => (
                Some(result.score),
                Some(result.method.as_str()),
                result.screenshot_url.as_deref(),
                Some(Json(&result.details)),
                None,
            ),
            LocationOutcome::Failed(failure) => {
                (None, None, None, None, Some(failure.error.as_str()))
            }
        };

        sqlx::query(
            r#"
            INSERT INTO traffic_logs (job_id, position, lat, lng, score, method,
                                      screenshot_url, details, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&job.id)
        .bind(position as i32)
        .bind(location.lat)
        .bind(location.lng)
        .bind(score)
        .bind(method)
        .bind(screenshot_url)
        .bind(details)
        .bind(error)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Load an archived job by id.
pub async fn get_archived_job(
    pool: &PgPool,
    job_id: &str,
) -> Result<Option<JobRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, status, remaining, dispatched, failures, cancel_requested,
               payload, result, error, created_at, updated_at
        FROM traffic_jobs
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    let Some(r) = row else {
        return Ok(None);
    };

    let status_str: String = r.try_get("status")?;
    let status = JobStatus::from_str(&status_str).map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: Box::new(e),
    })?;
    let payload: Json<JobPayload> = r.try_get("payload")?;
    let result: Json<JobResult> = r.try_get("result")?;

    Ok(Some(JobRecord {
        id: r.try_get("id")?,
        status,
        payload: payload.0,
        result: result.0,
        error: r.try_get("error")?,
        remaining: r.try_get::<i32, _>("remaining")?.max(0) as usize,
        dispatched: r.try_get::<i32, _>("dispatched")?.max(0) as usize,
        failures: r.try_get::<i32, _>("failures")?.max(0) as usize,
        cancel_requested: r.try_get("cancel_requested")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    }))
}
