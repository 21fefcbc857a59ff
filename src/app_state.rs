use sqlx::PgPool;

use crate::services::queue::JobQueue;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    /// Archive for finished jobs; `None` keeps everything in memory.
    pub db: Option<PgPool>,
    /// Prefix for screenshot links, copied into every submitted batch.
    pub public_base_url: Option<String>,
    /// Proxy applied to batches that do not bring their own.
    pub default_proxy: Option<String>,
}

impl AppState {
    pub fn new(queue: JobQueue, db: Option<PgPool>) -> Self {
        Self {
            queue,
            db,
            public_base_url: None,
            default_proxy: None,
        }
    }

    pub fn with_public_base_url(mut self, base_url: Option<String>) -> Self {
        self.public_base_url = base_url;
        self
    }

    pub fn with_default_proxy(mut self, proxy: Option<String>) -> Self {
        self.default_proxy = proxy;
        self
    }
}
