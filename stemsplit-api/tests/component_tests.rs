//! Router tests with in-process engine substitutes
//!
//! Uses `AppState::with_components` to swap the engine for fakes, covering
//! the last-resort panic handler and the catalog seam.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use stemsplit_api::models::{SeparationJob, StemArtifact};
use stemsplit_api::services::{ArtifactCatalog, CatalogError, DirectoryCatalog, EngineError, SeparationEngine};
use stemsplit_api::{build_router, AppState};
use stemsplit_common::config::ServiceConfig;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "component-boundary";

struct PanickingEngine;

#[async_trait]
impl SeparationEngine for PanickingEngine {
    async fn separate(&self, _job: &SeparationJob) -> Result<(), EngineError> {
        panic!("engine exploded at /secret/internal/path");
    }

    async fn probe(&self, _timeout: Duration) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Writes stems of fixed sizes into the Demucs layout
struct LayoutEngine;

#[async_trait]
impl SeparationEngine for LayoutEngine {
    async fn separate(&self, job: &SeparationJob) -> Result<(), EngineError> {
        let dir = job.model_dir().join(job.job_name());
        std::fs::create_dir_all(&dir).unwrap();
        for (stem, size) in [("vocals", 100), ("drums", 200), ("bass", 50), ("synth_pad", 10)] {
            std::fs::write(dir.join(format!("{}.wav", stem)), vec![0u8; size]).unwrap();
        }
        Ok(())
    }

    async fn probe(&self, _timeout: Duration) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Catalog that reports a fixed artifact list without scanning
struct FixedCatalog;

impl ArtifactCatalog for FixedCatalog {
    fn list_artifacts(&self, job: &SeparationJob) -> Result<Vec<StemArtifact>, CatalogError> {
        Ok(vec![StemArtifact {
            name: "Vocals".to_string(),
            url: format!("/separated/{}/reported/vocals.wav", job.job_name()),
            stem: "vocals".to_string(),
            size: 42,
        }])
    }
}

fn config(dir: &TempDir) -> ServiceConfig {
    let config = ServiceConfig::with_dirs(dir.path().join("uploads"), dir.path().join("separated"));
    config.ensure_directories().unwrap();
    config
}

fn upload(filename: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"{filename}\"\r\nContent-Type: audio/mpeg\r\n\r\nbytes\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/split-audio")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_panic_returns_generic_500() {
    let dir = TempDir::new().unwrap();
    let state = AppState::with_components(
        config(&dir),
        Arc::new(PanickingEngine),
        Arc::new(DirectoryCatalog::new()),
    );

    let response = build_router(state).oneshot(upload("song.mp3")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(body["code"], "internal-error");
    assert!(!body.to_string().contains("/secret/internal/path"));
}

#[tokio::test]
async fn test_display_names_and_totals() {
    let dir = TempDir::new().unwrap();
    let state = AppState::with_components(
        config(&dir),
        Arc::new(LayoutEngine),
        Arc::new(DirectoryCatalog::new()),
    );

    let response = build_router(state).oneshot(upload("Mix Down.m4a")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["original_filename"], "Mix_Down.m4a");
    assert_eq!(body["total_size"], 360);

    let names: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Bass", "Drums", "Synth_Pad", "Vocals"]);
}

#[tokio::test]
async fn test_catalog_seam_replaces_directory_scan() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let upload_dir = config.upload_dir.clone();
    let state = AppState::with_components(config, Arc::new(LayoutEngine), Arc::new(FixedCatalog));

    let response = build_router(state).oneshot(upload("song.ogg")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["files"].as_array().unwrap().len(), 1);
    assert_eq!(body["files"][0]["size"], 42);
    assert_eq!(body["total_size"], 42);
    assert_eq!(std::fs::read_dir(upload_dir).unwrap().count(), 0);
}
