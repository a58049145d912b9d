//! Axum HTTP API for render jobs.
//!
//! This crate provides:
//! - `POST /render`, the task entry point that runs the render pipeline
//! - `POST /jobs` and `GET /jobs/:job_id` for creating and polling jobs
//! - Health and Prometheus metrics endpoints
//! - Rate limiting and security headers

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
