//! Error types for filename/path metadata extraction.

use thiserror::Error;

/// Errors that can occur while extracting metadata from a file path.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The path has no filename component to parse.
    #[error("path '{0}' has no filename stem")]
    NoFileStem(String),
}
