//! Static serving of separated stems
//!
//! GET /separated/*path streams a file from the output directory.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue},
    response::Response,
    routing::get,
    Router,
};
use std::path::{Component, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

const CACHE_CONTROL_VALUE: &str = "public, max-age=3600";

/// GET /separated/*path
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let relative = confined_path(&path).ok_or_else(|| ApiError::NotFound(path.clone()))?;
    let full_path = state.config.output_dir.join(relative);

    let is_file = tokio::fs::metadata(&full_path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ApiError::NotFound(path));
    }

    let mut response = ServeFile::new(&full_path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
    }

    Ok(response.map(Body::new))
}

/// Relative path with only normal components, or `None` if it could
/// escape the output directory
fn confined_path(raw: &str) -> Option<PathBuf> {
    let path = std::path::Path::new(raw.trim_start_matches('/'));
    let mut confined = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => confined.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if confined.as_os_str().is_empty() {
        None
    } else {
        Some(confined)
    }
}

/// Build artifact routes
pub fn artifact_routes() -> Router<AppState> {
    Router::new().route("/separated/*path", get(serve_artifact))
}
