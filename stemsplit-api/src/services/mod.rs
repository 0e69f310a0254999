//! Separation pipeline services
//!
//! Leaf-first: validation → naming → storage → engine → output mapping →
//! cleanup. Health reporting runs independently of the request flow.

pub mod artifact_namer;
pub mod health_reporter;
pub mod lifecycle_cleaner;
pub mod output_mapper;
pub mod separation_engine;
pub mod separation_pipeline;
pub mod upload_store;
pub mod upload_validator;

pub use health_reporter::{HealthReporter, HealthSnapshot, HealthStatus};
pub use output_mapper::{ArtifactCatalog, CatalogError, DirectoryCatalog};
pub use separation_engine::{EngineError, ProcessEngine, SeparationEngine};
pub use separation_pipeline::{PipelineError, SeparationOutcome, SeparationPipeline};
pub use upload_store::{PendingUpload, StorageError, UploadStore};
pub use upload_validator::{validate_upload, ValidatedUpload, ValidationError};
