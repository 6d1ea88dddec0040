//! Search Provider errors.

use thiserror::Error;

/// Errors a [`super::SearchProvider`] can raise.
#[derive(Error, Debug)]
pub enum SearchProviderError {
    /// The underlying transport (HTTP fetch, feed parse) failed.
    #[error("search transport error: {0}")]
    Transport(String),

    /// The provider's feed/response body could not be parsed.
    #[error("search response parse error: {0}")]
    Parse(String),

    /// The provider is not configured correctly (e.g. missing feed URL).
    #[error("search provider misconfigured: {0}")]
    Configuration(String),
}

/// Result type alias for search provider operations.
pub type Result<T> = std::result::Result<T, SearchProviderError>;
