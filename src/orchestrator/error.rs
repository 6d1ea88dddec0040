//! Download Orchestrator errors.

use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors the Download Orchestrator can raise.
///
/// Per-provider and per-submit failures are not represented here: §4.4
/// requires those to be caught and turned into ordinary `Failed`
/// submissions or skipped providers, not propagated. This enum covers
/// only failures that abort the whole run.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The requested tracking record does not exist.
    #[error("tracking record {0} not found")]
    TrackingNotFound(i64),

    /// A catalog store operation failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
