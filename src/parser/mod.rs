//! Filename/path metadata extraction (§4.2).
//!
//! Given a downloaded file's path, extracts as much structured metadata
//! as the filename stem and its containing directories yield: title,
//! issue date, special-edition flag, language, and country. The pattern
//! catalog and directory walk live in [`filename`]; language/country
//! detection and title categorization are split into their own modules
//! since each is independently useful (the Import Pipeline calls
//! [`categorize::categorize`] directly, for instance).

mod categorize;
mod country;
mod error;
mod filename;
mod language;

pub use categorize::categorize;
pub use country::detect_country;
pub use error::ParseError;
pub use filename::{
    Confidence, MatchedPattern, ParsedFilename, ParsedMetadata, get_title_from_path, parse_file,
    parse_filename,
};
pub use language::detect_language;

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParseError>;
