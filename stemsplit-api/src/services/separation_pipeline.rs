//! Separation of one stored input: invoke → map → clean
//!
//! Runs sequentially inside the request that stored the input. Each job owns
//! a uniquely named input file and output subtree, so concurrent jobs need
//! no locking.

use crate::models::{SeparationJob, StemArtifact, StoredInput};
use crate::services::lifecycle_cleaner::remove_stored_input;
use crate::services::output_mapper::{ArtifactCatalog, CatalogError};
use crate::services::separation_engine::{EngineError, SeparationEngine};
use crate::services::upload_store::StorageError;
use std::sync::Arc;
use stemsplit_common::config::ServiceConfig;
use thiserror::Error;
use tracing::{info, warn};

/// Pipeline failure; the stored input is left in place for every variant
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Result of a successful separation
#[derive(Debug, Clone)]
pub struct SeparationOutcome {
    pub job: SeparationJob,
    pub artifacts: Vec<StemArtifact>,
}

impl SeparationOutcome {
    pub fn total_size(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size).sum()
    }
}

#[derive(Clone)]
pub struct SeparationPipeline {
    config: Arc<ServiceConfig>,
    engine: Arc<dyn SeparationEngine>,
    catalog: Arc<dyn ArtifactCatalog>,
}

impl SeparationPipeline {
    pub fn new(
        config: Arc<ServiceConfig>,
        engine: Arc<dyn SeparationEngine>,
        catalog: Arc<dyn ArtifactCatalog>,
    ) -> Self {
        Self {
            config,
            engine,
            catalog,
        }
    }

    pub async fn run(&self, input: StoredInput) -> Result<SeparationOutcome, PipelineError> {
        let job = SeparationJob::new(input, &self.config.engine.model, &self.config.output_dir);

        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| StorageError::io(&job.output_dir, e))?;

        self.engine.separate(&job).await?;

        let catalog = Arc::clone(&self.catalog);
        let scan_job = job.clone();
        let artifacts = tokio::task::spawn_blocking(move || catalog.list_artifacts(&scan_job))
            .await
            .map_err(|e| CatalogError::Io(e.to_string()))??;

        info!(
            identity = %job.input.identity,
            stems = artifacts.len(),
            "Separation output mapped"
        );

        if let Err(e) = remove_stored_input(&job.input).await {
            warn!(identity = %job.input.identity, error = %e, "Failed to remove stored input");
        }

        Ok(SeparationOutcome { job, artifacts })
    }
}
