//! Traffic analysis job queue
//!
//! Accepts batches of locations, analyzes them on a fixed pool of background
//! workers with bounded per-batch concurrency, and lets clients poll or
//! cancel each batch while it runs.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
