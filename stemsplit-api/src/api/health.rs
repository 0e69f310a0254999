//! Health check endpoint
//!
//! GET /health returns a fresh [`HealthSnapshot`]: 200 when healthy, 503
//! otherwise.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use crate::{services::HealthSnapshot, AppState};

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthSnapshot>) {
    let snapshot = state.health.snapshot().await;

    let status = if snapshot.is_healthy() {
        StatusCode::OK
    } else {
        tracing::warn!(
            upload_ok = snapshot.application.upload_folder_accessible,
            output_ok = snapshot.application.separated_folder_accessible,
            engine_ok = snapshot.application.demucs_available,
            disk_free_gb = ?snapshot.system.disk_free_gb,
            "Health check unhealthy"
        );
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(snapshot))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
