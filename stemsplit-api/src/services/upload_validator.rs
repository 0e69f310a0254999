//! Upload intake validation
//!
//! Pure checks on the declared file field. Nothing here touches storage.

use crate::models::UploadRequest;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Accepted input formats (lower-case, without dot)
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["mp3", "wav", "flac", "m4a", "aac", "ogg"];

/// Why an upload was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No `audio` field in the request
    #[error("No audio file provided")]
    MissingFile,

    /// Filename is empty, or nothing survives sanitization
    #[error("No file selected")]
    EmptyFilename,

    #[error("Unsupported file type. Allowed: mp3, wav, flac, m4a, aac, ogg")]
    UnsupportedType,
}

impl ValidationError {
    /// Machine-distinguishable reason
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MissingFile => "missing-file",
            ValidationError::EmptyFilename => "empty-filename",
            ValidationError::UnsupportedType => "unsupported-type",
        }
    }
}

/// An upload whose metadata passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    /// Sanitized filename, always non-empty and ending in `.{extension}`
    pub filename: String,
    /// Lower-cased extension from [`ALLOWED_EXTENSIONS`]
    pub extension: String,
}

/// Stem used when sanitization leaves only the extension
const FALLBACK_STEM: &str = "upload";

/// Validate a declared upload; `None` means the field was absent
///
/// The extension is read from the client's filename before sanitization,
/// so a name such as `日本語.mp3` is accepted and stored as `upload.mp3`.
pub fn validate_upload(upload: Option<&UploadRequest>) -> Result<ValidatedUpload, ValidationError> {
    let upload = upload.ok_or(ValidationError::MissingFile)?;

    let sanitized = sanitize_filename(&upload.filename);
    if sanitized.is_empty() {
        return Err(ValidationError::EmptyFilename);
    }

    let extension = declared_extension(&upload.filename).ok_or(ValidationError::UnsupportedType)?;
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedType);
    }

    let suffix = format!(".{}", extension);
    let filename = if sanitized.len() > suffix.len() && sanitized.to_ascii_lowercase().ends_with(&suffix) {
        sanitized
    } else {
        format!("{}{}", FALLBACK_STEM, suffix)
    };

    Ok(ValidatedUpload { filename, extension })
}

/// Lower-cased text after the last `.` of the final path component
fn declared_extension(raw: &str) -> Option<String> {
    let basename = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw);
    basename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_lowercase())
}

/// Reduce a client filename to a flat, ASCII, filesystem-safe name
///
/// Unicode is NFKD-decomposed first so accented letters keep their ASCII
/// base (`café` becomes `cafe`). Separators become whitespace, whitespace
/// runs become `_`, anything outside `[A-Za-z0-9_.-]` is dropped, and
/// leading/trailing `.`/`_` are trimmed so the result can never name a
/// parent or hidden path.
pub fn sanitize_filename(raw: &str) -> String {
    let spaced: String = raw
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}
