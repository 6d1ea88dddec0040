//! Title normalization and fuzzy similarity for periodical titles.
//!
//! Scene-release filenames, RSS feeds, and upload catalogs produce noisy
//! title strings ("Wired.Magazine.UK.No.245.2023.PDF-GROUP-xpost"). This
//! module collapses them to a canonical, comparable form and provides the
//! similarity surface the Import Pipeline's duplicate check relies on.

mod normalizer;
mod similarity;

pub use normalizer::clean_title;
pub use similarity::{matches, similarity};
