//! Separation request handler
//!
//! POST /split-audio: validate → name → store → separate → map → clean

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    models::{StemArtifact, UploadRequest},
    services::{artifact_namer, validate_upload, ValidationError},
    AppState,
};

/// Multipart field carrying the audio file
pub const AUDIO_FIELD: &str = "audio";

/// POST /split-audio response
#[derive(Debug, Serialize)]
pub struct SplitAudioResponse {
    pub message: String,
    pub files: Vec<StemArtifact>,
    /// Sanitized name of the uploaded file
    pub original_filename: String,
    /// Wall-clock seconds spent on the request
    pub processing_time: f64,
    /// Sum of `files[].size`
    pub total_size: u64,
}

/// POST /split-audio
///
/// Blocks until the engine finishes or times out. Only the first `audio`
/// field is processed; other fields are ignored.
pub async fn split_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<SplitAudioResponse>> {
    let started = Instant::now();
    let limit_mb = state.config.max_file_size_mb();

    // Not multipart at all: there is no file field to find
    let mut multipart = multipart.map_err(|_| ApiError::Validation(ValidationError::MissingFile))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_mb))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        return process_audio_field(&state, field, started).await.map(Json);
    }

    Err(ValidationError::MissingFile.into())
}

async fn process_audio_field(
    state: &AppState,
    mut field: Field<'_>,
    started: Instant,
) -> ApiResult<SplitAudioResponse> {
    let limit_mb = state.config.max_file_size_mb();

    let upload = UploadRequest {
        filename: field.file_name().unwrap_or_default().to_string(),
        content_type: field.content_type().map(str::to_string),
    };
    let validated = validate_upload(Some(&upload))?;

    let identity = artifact_namer::name_upload(&validated.filename);
    let mut pending = state
        .upload_store
        .create(identity, validated.filename.clone())
        .await?;

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = pending.write_chunk(&chunk).await {
                    pending.discard().await;
                    return Err(e.into());
                }
            }
            Ok(None) => break,
            Err(e) => {
                pending.discard().await;
                return Err(multipart_error(e, limit_mb));
            }
        }
    }

    let stored = pending.finish().await?;
    info!(
        identity = %stored.identity,
        size = stored.size,
        format = %validated.extension,
        content_type = upload.content_type.as_deref().unwrap_or("unknown"),
        "Uploaded file"
    );

    let original_filename = stored.original_filename.clone();
    let outcome = state.pipeline.run(stored).await?;
    let total_size = outcome.total_size();
    let processing_time = started.elapsed().as_secs_f64();

    info!(
        identity = %outcome.job.input.identity,
        stems = outcome.artifacts.len(),
        total_size,
        processing_time_s = processing_time,
        "Processing completed"
    );

    Ok(SplitAudioResponse {
        message: "Audio processed successfully".to_string(),
        files: outcome.artifacts,
        original_filename,
        processing_time,
        total_size,
    })
}

fn multipart_error(err: MultipartError, limit_mb: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit_mb }
    } else {
        ApiError::MalformedUpload(err.body_text())
    }
}

/// Build separation routes
pub fn separation_routes() -> Router<AppState> {
    Router::new().route("/split-audio", post(split_audio))
}
