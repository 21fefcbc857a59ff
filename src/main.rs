use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use traffic_jobs::{
    app_state::AppState,
    config::AppConfig,
    db, routes,
    services::{analyzer::HttpAnalyzer, queue::JobQueue},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing traffic-jobs server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("traffic_jobs_submitted_total", "Total batches submitted");
    metrics::describe_counter!(
        "traffic_jobs_completed_total",
        "Batches that reached a terminal status, by status"
    );
    metrics::describe_counter!(
        "traffic_locations_failed_total",
        "Locations whose analysis failed after all retries"
    );
    metrics::describe_counter!(
        "traffic_analysis_retries_total",
        "Analysis attempts that failed and were retried"
    );
    metrics::describe_histogram!(
        "traffic_job_duration_seconds",
        "Time from a worker picking up a batch to its terminal status"
    );
    metrics::describe_gauge!("traffic_jobs_in_memory", "Job records currently held in memory");

    // Optional archive for finished jobs
    let db_pool = match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL job archive");
            let pool = db::init_pool(url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, finished jobs are kept in memory only");
            None
        }
    };

    tracing::info!(analyzer_url = %config.analyzer_url, "Initializing analysis client");
    let analyzer =
        HttpAnalyzer::new(config.analyzer_url.clone()).expect("Failed to initialize analyzer");

    let queue = JobQueue::start(config.queue_config(), Arc::new(analyzer));

    let state = AppState::new(queue, db_pool)
        .with_public_base_url(config.public_base_url.clone())
        .with_default_proxy(config.selenium_proxy.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/analyze-batch", post(routes::jobs::submit_batch))
        .route(
            "/job/{job_id}",
            get(routes::jobs::get_job).delete(routes::jobs::delete_job),
        )
        .route("/job/{job_id}/cancel", post(routes::jobs::cancel_job))
        .with_state(state)
        // Screenshots written by the analysis service
        .nest_service("/static", ServeDir::new(&config.static_dir))
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
