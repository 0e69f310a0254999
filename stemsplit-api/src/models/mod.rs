//! Data model for the separation pipeline
//!
//! Nothing here is persisted beyond the filesystem layout:
//! - `{upload_dir}/{identity}` holds a [`StoredInput`] until separation succeeds
//! - `{output_dir}/{job_name}/{model}/{job_name}/{stem}.wav` holds the stems

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Declared metadata of an inbound multipart file field
///
/// The bytes themselves are streamed straight to storage once the
/// metadata has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Filename as sent by the client (unsanitized, may be empty)
    pub filename: String,
    /// Declared MIME type, informational only
    pub content_type: Option<String>,
}

/// Filesystem-safe unique name of one upload, e.g. `1a2b3c4d_song.mp3`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactIdentity(String);

impl ArtifactIdentity {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity without its extension; names the job's output directory
    /// and the track directory the engine creates inside it
    pub fn job_name(&self) -> &str {
        Path::new(&self.0)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An upload persisted under its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredInput {
    pub identity: ArtifactIdentity,
    pub path: PathBuf,
    /// Sanitized original filename, echoed back to the client
    pub original_filename: String,
    pub size: u64,
}

/// One separation run: input, model, and the directory the engine writes into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparationJob {
    pub input: StoredInput,
    pub model: String,
    /// `{output_root}/{job_name}`
    pub output_dir: PathBuf,
}

impl SeparationJob {
    pub fn new(input: StoredInput, model: impl Into<String>, output_root: &Path) -> Self {
        let output_dir = output_root.join(input.identity.job_name());
        Self {
            input,
            model: model.into(),
            output_dir,
        }
    }

    pub fn job_name(&self) -> &str {
        self.input.identity.job_name()
    }

    /// Directory the engine is expected to create for this model
    pub fn model_dir(&self) -> PathBuf {
        self.output_dir.join(&self.model)
    }
}

/// One produced stem file, as reported to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StemArtifact {
    /// Display name, e.g. "Vocals"
    pub name: String,
    /// Public URL served by `GET /separated/<path>`
    pub url: String,
    /// Stem name, e.g. "vocals"
    pub stem: String,
    /// Size in bytes at mapping time
    pub size: u64,
}
