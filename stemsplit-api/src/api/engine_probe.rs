//! Ad hoc engine availability probe
//!
//! GET /test-demucs runs the engine with `--help`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::{services::EngineError, AppState};

/// GET /test-demucs
pub async fn test_engine(State(state): State<AppState>) -> Response {
    match state.engine.probe(state.config.engine.diagnostic_timeout).await {
        Ok(()) => Json(json!({ "status": "Demucs is available" })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Engine probe failed");
            let message = match &e {
                EngineError::Spawn { .. } => "Demucs not found or not working",
                EngineError::Failed { .. } | EngineError::TimedOut(_) => "Demucs not working",
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": message,
                    "code": "engine-unavailable",
                    "details": e.details(),
                })),
            )
                .into_response()
        }
    }
}

/// Build engine probe routes
pub fn engine_probe_routes() -> Router<AppState> {
    Router::new().route("/test-demucs", get(test_engine))
}
