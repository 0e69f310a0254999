//! stemsplit-api library interface
//!
//! Exposes the router and its components for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::{extract::DefaultBodyLimit, response::Response, Router};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;
use stemsplit_common::config::ServiceConfig;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::services::{
    ArtifactCatalog, DirectoryCatalog, HealthReporter, ProcessEngine, SeparationEngine,
    SeparationPipeline, UploadStore,
};

/// Application state shared across handlers
///
/// Everything here is immutable after construction; requests share only
/// the filesystem.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub engine: Arc<dyn SeparationEngine>,
    pub upload_store: UploadStore,
    pub pipeline: SeparationPipeline,
    pub health: HealthReporter,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// State backed by the configured engine process and a directory scan
    pub fn new(config: ServiceConfig) -> Self {
        let engine = Arc::new(ProcessEngine::from_config(&config.engine));
        Self::with_components(config, engine, Arc::new(DirectoryCatalog::new()))
    }

    /// State with a substituted engine and/or catalog
    pub fn with_components(
        config: ServiceConfig,
        engine: Arc<dyn SeparationEngine>,
        catalog: Arc<dyn ArtifactCatalog>,
    ) -> Self {
        let config = Arc::new(config);
        let startup_time = Utc::now();

        Self {
            upload_store: UploadStore::new(config.upload_dir.clone()),
            pipeline: SeparationPipeline::new(Arc::clone(&config), Arc::clone(&engine), catalog),
            health: HealthReporter::new(Arc::clone(&config), Arc::clone(&engine), startup_time),
            engine,
            config,
            startup_time,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .merge(api::separation_routes())
        .merge(api::artifact_routes())
        .merge(api::health_routes())
        .merge(api::engine_probe_routes())
        .fallback(api::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// Last-resort handler; never echoes the panic payload to the client
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = message, "Handler panicked");

    error::internal_error_response()
}
