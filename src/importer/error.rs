//! Import Pipeline errors.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::parser::ParseError;

/// Errors the Import Pipeline can raise. Per §4.6's failure semantics,
/// any of these rolls the pipeline back: the source file and the
/// originating submission (if any) are left untouched so the next
/// monitor pass retries.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("filename/path parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("cover extraction failed: {0}")]
    Cover(String),

    #[error("no usable file extension for {0}")]
    UnsupportedExtension(String),
}

/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;
