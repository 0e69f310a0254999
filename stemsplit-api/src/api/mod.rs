//! HTTP API handlers for stemsplit-api

pub mod artifacts;
pub mod engine_probe;
pub mod health;
pub mod separation;

pub use artifacts::artifact_routes;
pub use engine_probe::engine_probe_routes;
pub use health::health_routes;
pub use separation::separation_routes;

use crate::error::ApiError;

/// Fallback for unknown routes
pub async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
