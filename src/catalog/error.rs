//! Catalog store error type.

use thiserror::Error;

/// Errors from catalog store operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Underlying database error.
    #[error("catalog database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An id-addressed row was not found.
    #[error("no row found for id {0}")]
    NotFound(i64),

    /// A JSON metadata column failed to (de)serialize.
    #[error("invalid metadata JSON: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Returns `Ok(())` if at least one row was affected; otherwise [`CatalogError::NotFound`].
pub(crate) fn check_affected(id: i64, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(CatalogError::NotFound(id))
    } else {
        Ok(())
    }
}
