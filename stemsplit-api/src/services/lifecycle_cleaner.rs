//! Removal of stored inputs after successful separation
//!
//! Only called once stems are mapped. Failed jobs keep their input for
//! inspection.

use crate::models::StoredInput;
use crate::services::upload_store::StorageError;
use std::io::ErrorKind;
use tracing::{debug, info};

/// Delete the stored input; an already-missing file is not an error
pub async fn remove_stored_input(input: &StoredInput) -> Result<(), StorageError> {
    match tokio::fs::remove_file(&input.path).await {
        Ok(()) => {
            info!(identity = %input.identity, "Removed stored input");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(identity = %input.identity, "Stored input already removed");
            Ok(())
        }
        Err(e) => Err(StorageError::io(&input.path, e)),
    }
}
