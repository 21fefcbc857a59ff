mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use helpers::{delete_archived_job, locations, queue_config, RecordingAnalyzer};
use traffic_jobs::{
    app_state::AppState,
    config::AppConfig,
    db::{self, queries},
    models::job::{JobPayload, JobStatus},
    routes::jobs::{cancel_job, get_job},
    services::queue::JobQueue,
};

/// Integration test: finished jobs move from memory into Postgres
///
/// 1. Submit a batch and poll it through the HTTP handler until done
/// 2. The settled poll archives the job and evicts it from memory
/// 3. Later polls and cancels are answered from the archive
///
/// Note: This requires a running PostgreSQL instance configured via
/// DATABASE_URL.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Run with: cargo test --test archive_test -- --ignored
async fn test_settled_job_is_archived_and_evicted() {
    let config = AppConfig::from_env().expect("Failed to load config");
    let database_url = config.database_url.expect("DATABASE_URL must be set");

    let pool = db::init_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let analyzer = Arc::new(RecordingAnalyzer::new(Duration::from_millis(5), 0));
    let queue = JobQueue::start(queue_config(1, 3), analyzer);
    let state = AppState::new(queue, Some(pool.clone()));

    let input = locations(3);
    let job_id = state
        .queue
        .submit(JobPayload::new(input.clone()))
        .expect("Submit failed");

    let mut finished = None;
    for _ in 0..500 {
        let Json(polled) = get_job(State(state.clone()), Path(job_id.clone()))
            .await
            .expect("Poll failed");
        if polled.status == JobStatus::Done {
            finished = Some(polled);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let finished = finished.expect("Job never finished");
    assert_eq!(finished.remaining, 0);
    println!("✓ Job {} finished", job_id);

    assert!(state.queue.get(&job_id).is_none(), "Job should be evicted");
    println!("✓ Job evicted from memory");

    let archived = queries::get_archived_job(&pool, &job_id)
        .await
        .expect("Archive read failed")
        .expect("Job missing from archive");
    assert_eq!(archived.status, JobStatus::Done);
    assert_eq!(archived.result.count, 3);
    assert_eq!(archived.payload.locations, input);
    for (location, slot) in input.iter().zip(&archived.result.results) {
        let analysis = slot.as_ref().unwrap().analysis().unwrap();
        assert_eq!(analysis.score, location.lat + location.lng);
    }
    println!("✓ Archive holds all results");

    let Json(polled) = get_job(State(state.clone()), Path(job_id.clone()))
        .await
        .expect("Archived poll failed");
    assert_eq!(polled.status, JobStatus::Done);

    let Json(canceled) = cancel_job(State(state.clone()), Path(job_id.clone()))
        .await
        .expect("Archived cancel failed");
    assert_eq!(canceled.status, JobStatus::Done);
    println!("✓ Archived job answers polls and cancels");

    let deleted = delete_archived_job(&pool, &job_id)
        .await
        .expect("Cleanup failed");
    assert!(deleted);
    println!("✓ Cleanup complete");
}
