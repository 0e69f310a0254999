//! Discovery of produced stems
//!
//! [`ArtifactCatalog`] answers "which artifacts did job X produce". The
//! [`DirectoryCatalog`] implementation walks the engine's output tree, since
//! the engine reports nothing else.

use crate::models::{SeparationJob, StemArtifact};
use std::path::{Component, Path};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions the engine may emit for stems
pub const STEM_EXTENSIONS: [&str; 3] = ["wav", "mp3", "flac"];

/// URL prefix under which the output directory is served
pub const SEPARATED_URL_PREFIX: &str = "/separated";

/// Artifact listing errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Engine exited cleanly but left nothing behind
    #[error("Separation did not produce output in {0}")]
    OutputMissing(String),

    #[error("Failed to read output tree: {0}")]
    Io(String),
}

/// Lists the artifacts produced for a job
pub trait ArtifactCatalog: Send + Sync {
    fn list_artifacts(&self, job: &SeparationJob) -> Result<Vec<StemArtifact>, CatalogError>;
}

/// Catalog backed by a recursive scan of `{output_dir}/{model}`
#[derive(Debug, Clone, Default)]
pub struct DirectoryCatalog;

impl DirectoryCatalog {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactCatalog for DirectoryCatalog {
    fn list_artifacts(&self, job: &SeparationJob) -> Result<Vec<StemArtifact>, CatalogError> {
        let model_dir = job.model_dir();
        if !model_dir.is_dir() {
            return Err(CatalogError::OutputMissing(model_dir.display().to_string()));
        }

        let mut artifacts = Vec::new();

        let walker = WalkDir::new(&model_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            let entry = entry.map_err(|e| CatalogError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(stem) = stem_name(path) else {
                tracing::debug!(path = %path.display(), "Skipping non-audio output file");
                continue;
            };

            let size = entry
                .metadata()
                .map_err(|e| CatalogError::Io(e.to_string()))?
                .len();

            let relative = path
                .strip_prefix(&job.output_dir)
                .map_err(|e| CatalogError::Io(e.to_string()))?;

            artifacts.push(StemArtifact {
                name: display_name(&stem),
                url: artifact_url(job.job_name(), relative),
                stem,
                size,
            });
        }

        if artifacts.is_empty() {
            return Err(CatalogError::OutputMissing(model_dir.display().to_string()));
        }

        tracing::debug!(
            job = job.job_name(),
            count = artifacts.len(),
            "Mapped separated stems"
        );

        Ok(artifacts)
    }
}

/// File stem if the extension marks a stem file
fn stem_name(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !STEM_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

/// Human-friendly name for a stem
pub fn display_name(stem: &str) -> String {
    match stem {
        "vocals" => "Vocals".to_string(),
        "drums" => "Drums".to_string(),
        "bass" => "Bass".to_string(),
        "other" => "Other".to_string(),
        "piano" => "Piano".to_string(),
        "guitar" => "Guitar".to_string(),
        other => title_case(other),
    }
}

/// Upper-case the first letter of each alphabetic run, lower-case the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// `/separated/{job_name}/{relative/path/under/job/dir}`
fn artifact_url(job_name: &str, relative: &Path) -> String {
    let mut url = format!("{}/{}", SEPARATED_URL_PREFIX, job_name);
    for component in relative.components() {
        if let Component::Normal(part) = component {
            url.push('/');
            url.push_str(&part.to_string_lossy());
        }
    }
    url
}
