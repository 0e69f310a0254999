//! Persistence of validated uploads under `{upload_dir}/{identity}`
//!
//! Files are created with `create_new`, so an identity collision fails the
//! request instead of overwriting another upload.

use crate::models::{ArtifactIdentity, StoredInput};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Unexpected filesystem failure while saving, serving or deleting
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage path already in use: {0}")]
    AlreadyExists(PathBuf),

    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Upload directory writer
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open a new, exclusively owned file for `identity`
    pub async fn create(
        &self,
        identity: ArtifactIdentity,
        original_filename: String,
    ) -> Result<PendingUpload, StorageError> {
        let path = self.dir.join(identity.as_str());

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.clone()),
                _ => StorageError::io(&path, e),
            })?;

        debug!(path = %path.display(), "Opened upload for writing");

        Ok(PendingUpload {
            file,
            path,
            identity,
            original_filename,
            written: 0,
        })
    }
}

/// A partially written upload
///
/// Either [`finish`](Self::finish) it or [`discard`](Self::discard) it.
#[derive(Debug)]
pub struct PendingUpload {
    file: File,
    path: PathBuf,
    identity: ArtifactIdentity,
    original_filename: String,
    written: u64,
}

impl PendingUpload {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush to disk and hand over the stored input
    pub async fn finish(mut self) -> Result<StoredInput, StorageError> {
        self.file
            .flush()
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;

        Ok(StoredInput {
            identity: self.identity,
            path: self.path,
            original_filename: self.original_filename,
            size: self.written,
        })
    }

    /// Remove the partial file after a failed transfer
    pub async fn discard(self) {
        let PendingUpload { file, path, .. } = self;
        drop(file);
        if let Err(e) = fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}
