//! Download Client errors.

use thiserror::Error;

/// Errors a [`super::DownloadClient`] can raise.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The underlying transport (HTTP call) failed.
    #[error("download client transport error: {0}")]
    Transport(String),

    /// The client's response body could not be parsed.
    #[error("download client response parse error: {0}")]
    Parse(String),

    /// The client rejected the request (bad API key, malformed URL, ...).
    #[error("download client rejected request: {0}")]
    Rejected(String),

    /// The referenced job id is unknown to the client.
    #[error("unknown job id: {0}")]
    UnknownJob(String),
}

/// Result type alias for download client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
